//! Prime field arithmetic for polynomial secret sharing
//!
//! Every value lives in GF(p) for a large prime `p`, the field order. The order is
//! carried by a [`PrimeField`] value instead of a global so that alternate parameters
//! (tests, legacy deployments) can coexist in one process.
//!
//! # Timing
//!
//! `num-bigint` is not constant time: multiplication, reduction and inversion of
//! secret values leak timing correlated with operand size.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::ShamirError;

/// Default field order: the 512-bit safe prime `p = 2q + 1`.
///
/// Shared by every deployment; changing it breaks every previously issued shard.
pub const DEFAULT_ORDER_HEX: &str = concat!(
    "c0000000000000000000000000000000",
    "00000000000000000000000000000000",
    "00000000000000000000000000000000",
    "0000000000000000000000000000854f",
);

/// Small primes used for trial division before Miller-Rabin
const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97,
];

/// An element of a prime field.
///
/// Values produced by [`PrimeField`] are always reduced. Values parsed from untrusted
/// input are not, and must be range-checked with [`PrimeField::contains`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(BigUint);

impl FieldElement {
    /// The integer representative in `[0, order)`
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Minimal big-endian bytes (a single `0x00` for zero)
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// Big-endian bytes left-padded to `len`, or `None` if the value does not fit
    pub fn to_bytes_be_padded(&self, len: usize) -> Option<Vec<u8>> {
        let bytes = self.0.to_bytes_be();
        if bytes.len() > len {
            return None;
        }
        let mut out = vec![0u8; len - bytes.len()];
        out.extend_from_slice(&bytes);
        Some(out)
    }

    /// Lowercase big-endian hex, no prefix
    pub fn to_hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Parse big-endian hex (optional `0x` prefix). The result is not reduced.
    pub fn from_hex(s: &str) -> Result<Self, ShamirError> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ShamirError::InvalidShare("empty hex value".into()));
        }
        BigUint::parse_bytes(digits.as_bytes(), 16)
            .map(FieldElement)
            .ok_or_else(|| ShamirError::InvalidShare(format!("invalid hex value: {}", s)))
    }

    /// Interpret big-endian bytes without reduction
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        FieldElement(BigUint::from_bytes_be(bytes))
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement(0x{})", self.to_hex())
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldElement::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// GF(p) for a configured prime order `p`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeField {
    order: BigUint,
}

impl Default for PrimeField {
    fn default() -> Self {
        let order = BigUint::parse_bytes(DEFAULT_ORDER_HEX.as_bytes(), 16)
            .expect("DEFAULT_ORDER_HEX is valid hex");
        Self { order }
    }
}

impl PrimeField {
    /// Create a field for `order`.
    ///
    /// Only cheap structural checks are made here; use [`is_probable_prime`] when the
    /// order comes from configuration.
    pub fn new(order: BigUint) -> Result<Self, ShamirError> {
        if order <= BigUint::from(2u8) || order.is_even() {
            return Err(ShamirError::InvalidOrder(format!("{:x}", order)));
        }
        Ok(Self { order })
    }

    /// Create a field from a hex-encoded order
    pub fn from_hex(order_hex: &str) -> Result<Self, ShamirError> {
        let order = FieldElement::from_hex(order_hex)
            .map_err(|_| ShamirError::InvalidOrder(order_hex.to_string()))?;
        Self::new(order.0)
    }

    pub fn order(&self) -> &BigUint {
        &self.order
    }

    /// Bit length of the order
    pub fn bits(&self) -> u64 {
        self.order.bits()
    }

    /// Reduce an integer into the field
    pub fn element(&self, value: BigUint) -> FieldElement {
        FieldElement(value % &self.order)
    }

    pub fn from_u64(&self, value: u64) -> FieldElement {
        self.element(BigUint::from(value))
    }

    pub fn zero(&self) -> FieldElement {
        FieldElement(BigUint::zero())
    }

    pub fn one(&self) -> FieldElement {
        FieldElement(BigUint::one())
    }

    /// Whether `e` is a canonical (reduced) element of this field
    pub fn contains(&self, e: &FieldElement) -> bool {
        e.0 < self.order
    }

    pub fn add(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        self.element(&a.0 + &b.0)
    }

    pub fn sub(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let b = &b.0 % &self.order;
        self.element(&a.0 + &self.order - b)
    }

    pub fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        self.element(&a.0 * &b.0)
    }

    /// `base^exp mod p`
    pub fn pow(&self, base: &FieldElement, exp: u64) -> FieldElement {
        FieldElement(base.0.modpow(&BigUint::from(exp), &self.order))
    }

    /// Multiplicative inverse via the extended Euclidean algorithm
    pub fn inverse(&self, a: &FieldElement) -> Result<FieldElement, ShamirError> {
        let a = &a.0 % &self.order;
        if a.is_zero() {
            return Err(ShamirError::DivisionByZero);
        }

        let modulus = BigInt::from(self.order.clone());
        let (mut old_r, mut r) = (BigInt::from(a), modulus.clone());
        let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

        while !r.is_zero() {
            let q = &old_r / &r;
            let next_r = &old_r - &q * &r;
            old_r = std::mem::replace(&mut r, next_r);
            let next_s = &old_s - &q * &s;
            old_s = std::mem::replace(&mut s, next_s);
        }

        // gcd != 1 only happens for a composite order
        if !old_r.is_one() {
            return Err(ShamirError::DivisionByZero);
        }

        let (_, magnitude) = old_s.mod_floor(&modulus).into_parts();
        Ok(FieldElement(magnitude))
    }

    /// `a / b`
    pub fn div(&self, a: &FieldElement, b: &FieldElement) -> Result<FieldElement, ShamirError> {
        Ok(self.mul(a, &self.inverse(b)?))
    }

    /// Uniform element of `[0, order)`.
    ///
    /// Draws `bits(order)` random bits and resamples until the draw is below the
    /// order, so every element is equally likely.
    pub fn random_element<R>(&self, rng: &mut R) -> FieldElement
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let bits = self.order.bits();
        let byte_len = bits.div_ceil(8) as usize;
        let excess = (byte_len as u64 * 8 - bits) as u32;
        let mut buf = vec![0u8; byte_len];

        loop {
            rng.fill_bytes(&mut buf);
            buf[0] &= 0xffu8 >> excess;
            let candidate = BigUint::from_bytes_be(&buf);
            if candidate < self.order {
                buf.iter_mut().for_each(|b| *b = 0);
                return FieldElement(candidate);
            }
        }
    }

    /// Uniform nonzero element
    pub fn random_nonzero_element<R>(&self, rng: &mut R) -> FieldElement
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        loop {
            let e = self.random_element(rng);
            if !e.is_zero() {
                return e;
            }
        }
    }
}

/// Miller-Rabin probable-prime test with `rounds` random witnesses
pub fn is_probable_prime(n: &BigUint, rounds: usize) -> bool {
    let two = BigUint::from(2u8);
    if *n < two {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let one = BigUint::one();
    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    let mut rng = rand::thread_rng();

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
