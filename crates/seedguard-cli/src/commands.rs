//! Command implementations
//!
//! Each command takes the validated engine config and returns what should be printed.

use anyhow::{Context, Result};
use seedguard_recovery::EngineConfig;
use seedguard_shamir::{FieldElement, Point, SecretSharer};

/// Summary printed by `validate`
pub fn validate(config: &EngineConfig) -> Result<String> {
    let field = config.field()?;
    let mut out = String::from("✅ Configuration is valid.\n");
    out.push_str(&format!("  Field order:   {} bits\n", field.bits()));
    out.push_str(&format!(
        "  TOTP:          {} digits, {}s period, ±{} periods skew\n",
        config.totp.digits, config.totp.period_secs, config.totp.skew_periods
    ));
    out.push_str(&format!("  TOTP secret:   {} bytes\n", config.totp.secret_len));
    out.push_str(&format!(
        "  Owner KDF:     Argon2id m={} KiB, t={}, p={}\n",
        config.owner_kdf.m_cost, config.owner_kdf.t_cost, config.owner_kdf.p_cost
    ));
    out.push_str(&format!("  Log level:     {}", config.log_level));
    Ok(out)
}

/// TOTP code for a hex secret at `at_millis`
pub fn code(config: &EngineConfig, secret_hex: &str, at_millis: u64) -> Result<String> {
    let secret = hex::decode(secret_hex.trim()).context("--secret must be hex")?;
    anyhow::ensure!(!secret.is_empty(), "--secret must not be empty");
    let totp = config.totp()?;
    Ok(totp.derive_code(&secret, at_millis))
}

/// Split a hex secret among participants `1..=shares`, returning JSON points
pub fn split(
    config: &EngineConfig,
    secret_hex: &str,
    threshold: usize,
    shares: usize,
) -> Result<String> {
    let field = config.field()?;
    let secret = FieldElement::from_hex(secret_hex).context("--secret must be hex")?;
    anyhow::ensure!(
        field.contains(&secret),
        "secret does not fit in the configured field ({} bits)",
        field.bits()
    );

    let ids: Vec<FieldElement> = (1..=shares as u64).map(|i| field.from_u64(i)).collect();
    let points = SecretSharer::new(field).split(&secret, threshold, &ids)?;
    log::info!("Split secret into {} shares, threshold {}", shares, threshold);

    Ok(serde_json::to_string_pretty(&points)?)
}

/// Recover the hex secret from JSON points
pub fn recover(config: &EngineConfig, points_json: &str) -> Result<String> {
    let points: Vec<Point> =
        serde_json::from_str(points_json).context("Expected a JSON array of {x, y} points")?;
    let sharer = SecretSharer::new(config.field()?);
    let secret = sharer.recover(&points)?;
    log::info!("Recovered secret from {} shares", points.len());
    Ok(secret.to_hex())
}
