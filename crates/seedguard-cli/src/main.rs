//! SeedGuard CLI: operator tool for the recovery engine
//!
//! # Usage
//!
//! ```bash
//! seedguard --config seedguard.toml validate
//! seedguard code --secret 3132333435363738393031323334353637383930 --at 59000
//! seedguard split --secret abcdef --threshold 2 --shares 3 > points.json
//! seedguard recover < points.json
//! ```

mod commands;
mod config;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Validate,
    Code { secret: String, at: Option<u64> },
    Split {
        secret: String,
        threshold: usize,
        shares: usize,
    },
    Recover,
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    config_path: Option<PathBuf>,
    command: Command,
}

fn main() -> Result<()> {
    // Manual argument parsing
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = parse_args(&args)?;

    match invocation.command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("seedguard {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load config
    let mut cli_config = match &invocation.config_path {
        Some(path) => config::CliConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::CliConfig::default(),
    };

    // Apply env overrides
    cli_config.apply_env_overrides();

    // Validate
    cli_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &cli_config.engine.log_level);
    env_logger::init();

    let engine = &cli_config.engine;
    let output = match invocation.command {
        Command::Validate => commands::validate(engine)?,
        Command::Code { secret, at } => {
            let at = match at {
                Some(ms) => ms,
                None => now_millis()?,
            };
            commands::code(engine, &secret, at)?
        }
        Command::Split {
            secret,
            threshold,
            shares,
        } => commands::split(engine, &secret, threshold, shares)?,
        Command::Recover => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read points from stdin")?;
            commands::recover(engine, &input)?
        }
        Command::Help | Command::Version => return Ok(()),
    };

    println!("{}", output);
    Ok(())
}

fn now_millis() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?;
    Ok(elapsed.as_millis() as u64)
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut command_name: Option<&str> = None;
    let mut secret = None;
    let mut at = None;
    let mut threshold = None;
    let mut shares = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value_of(args, &mut i, "--config")?));
            }
            "--secret" => {
                secret = Some(value_of(args, &mut i, "--secret")?.to_string());
            }
            "--at" => {
                let v = value_of(args, &mut i, "--at")?;
                at = Some(v.parse::<u64>().with_context(|| format!("Invalid --at: {}", v))?);
            }
            "--threshold" | "-t" => {
                let v = value_of(args, &mut i, "--threshold")?;
                threshold = Some(
                    v.parse::<usize>()
                        .with_context(|| format!("Invalid --threshold: {}", v))?,
                );
            }
            "--shares" | "-n" => {
                let v = value_of(args, &mut i, "--shares")?;
                shares = Some(
                    v.parse::<usize>()
                        .with_context(|| format!("Invalid --shares: {}", v))?,
                );
            }
            "--help" | "-h" => command_name = Some("help"),
            "--version" | "-V" => command_name = Some("version"),
            other if !other.starts_with('-') && command_name.is_none() => {
                command_name = Some(other);
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let command = match command_name {
        None | Some("help") => Command::Help,
        Some("version") => Command::Version,
        Some("validate") => Command::Validate,
        Some("code") => Command::Code {
            secret: secret.context("code requires --secret <hex>")?,
            at,
        },
        Some("split") => Command::Split {
            secret: secret.context("split requires --secret <hex>")?,
            threshold: threshold.context("split requires --threshold <T>")?,
            shares: shares.context("split requires --shares <N>")?,
        },
        Some("recover") => Command::Recover,
        Some(other) => anyhow::bail!("Unknown command: {}", other),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn value_of<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(v) => Ok(v.as_str()),
        None => anyhow::bail!("{} requires a value", flag),
    }
}

fn print_help() {
    println!(
        r#"SeedGuard: distributed key recovery tool

USAGE:
    seedguard [OPTIONS] <COMMAND>

COMMANDS:
    validate              Validate the configuration and print a summary
    code                  Print the TOTP code for a secret
    split                 Split a hex secret into JSON points
    recover               Recover a hex secret from JSON points on stdin

OPTIONS:
    -c, --config <PATH>   Config file path (defaults are used when omitted)
    --secret <HEX>        Secret for `code` and `split`
    --at <MILLIS>         Timestamp for `code` (default: now)
    -t, --threshold <T>   Shares needed to recover (`split`)
    -n, --shares <N>      Shares to produce (`split`)
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    SEEDGUARD_LOG_LEVEL     Log level (error/warn/info/debug/trace)
    SEEDGUARD_FIELD_ORDER   Field order as hex
    SEEDGUARD_TOTP_PERIOD   TOTP period in seconds
    SEEDGUARD_TOTP_DIGITS   TOTP code length
    SEEDGUARD_TOTP_SKEW     Tolerated clock skew in periods

EXAMPLES:
    # Split a secret 2-of-3 and recover it
    seedguard split --secret abcdef --threshold 2 --shares 3 > points.json
    seedguard recover < points.json

    # Validate a deployment config
    seedguard --config seedguard.toml validate
"#
    );
}
