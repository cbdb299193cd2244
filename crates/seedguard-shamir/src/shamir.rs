//! Threshold secret sharing over a prime field
//!
//! Split a secret into N shares where any T can reconstruct it.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::field::{FieldElement, PrimeField};
use crate::matrix::vandermonde;
use crate::ShamirError;

/// A single share: the polynomial evaluated at a participant's id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Participant id
    pub x: FieldElement,
    /// Polynomial value at `x`
    pub y: FieldElement,
}

/// One original share value re-split for a new participant set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResharedShare {
    /// x-coordinate of the original share this set re-splits
    pub original_x: FieldElement,
    /// Sub-shares of the original y, one per new participant
    pub points: Vec<Point>,
}

/// Splits and recovers secrets in a fixed prime field
#[derive(Debug, Clone, Default)]
pub struct SecretSharer {
    field: PrimeField,
}

impl SecretSharer {
    pub fn new(field: PrimeField) -> Self {
        Self { field }
    }

    pub fn field(&self) -> &PrimeField {
        &self.field
    }

    /// Split `secret` among `participant_ids` with the OS random source
    pub fn split(
        &self,
        secret: &FieldElement,
        threshold: usize,
        participant_ids: &[FieldElement],
    ) -> Result<Vec<Point>, ShamirError> {
        self.split_with_rng(secret, threshold, participant_ids, &mut OsRng)
    }

    /// Split `secret` into one share per participant id.
    ///
    /// Builds `p(x) = secret + c1·x + … + c(T-1)·x^(T-1)` with random coefficients and
    /// evaluates it at every id as `vandermonde(ids) · coefficients`.
    pub fn split_with_rng<R>(
        &self,
        secret: &FieldElement,
        threshold: usize,
        participant_ids: &[FieldElement],
        rng: &mut R,
    ) -> Result<Vec<Point>, ShamirError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        if threshold == 0 {
            return Err(ShamirError::InvalidThreshold);
        }
        if threshold > participant_ids.len() {
            return Err(ShamirError::InsufficientParticipants {
                threshold,
                participants: participant_ids.len(),
            });
        }
        self.check_ids(participant_ids)?;

        let mut coefficients = Vec::with_capacity(threshold);
        coefficients.push(self.field.element(secret.value().clone()));
        for _ in 1..threshold {
            coefficients.push(self.field.random_element(rng));
        }

        let ys = vandermonde(&self.field, participant_ids, threshold)
            .mul_vector(&self.field, &coefficients)?;

        log::debug!(
            "Split secret into {} shares (threshold {})",
            participant_ids.len(),
            threshold
        );

        Ok(participant_ids
            .iter()
            .zip(ys)
            .map(|(x, y)| Point { x: x.clone(), y })
            .collect())
    }

    /// Recover the secret (the polynomial at x = 0) from shares.
    ///
    /// Uses every supplied share, so any superset of a threshold set works. Fewer
    /// than threshold shares still produce a value: this layer cannot tell, and the
    /// caller must check the result against something it already trusts.
    pub fn recover(&self, shares: &[Point]) -> Result<FieldElement, ShamirError> {
        if shares.is_empty() {
            return Err(ShamirError::InsufficientShares);
        }
        for share in shares {
            if !self.field.contains(&share.x) || !self.field.contains(&share.y) {
                return Err(ShamirError::InvalidShare(
                    "share coordinate outside the field".into(),
                ));
            }
        }

        let xs: Vec<FieldElement> = shares.iter().map(|s| s.x.clone()).collect();
        let inverse = vandermonde(&self.field, &xs, xs.len()).invert(&self.field)?;
        let weights = inverse
            .row(0)
            .ok_or_else(|| ShamirError::InvalidShare("empty interpolation matrix".into()))?;

        let secret = shares
            .iter()
            .zip(weights)
            .fold(self.field.zero(), |acc, (share, w)| {
                self.field.add(&acc, &self.field.mul(&share.y, w))
            });

        log::debug!("Recovered secret from {} shares", shares.len());
        Ok(secret)
    }

    /// Re-share for a new participant set and threshold.
    ///
    /// Each of the first `threshold` original shares has its y re-split on its own, so
    /// recovering any original share value needs `new_threshold` of the new holders.
    pub fn reshare(
        &self,
        shares: &[Point],
        threshold: usize,
        new_participant_ids: &[FieldElement],
        new_threshold: usize,
    ) -> Result<Vec<ResharedShare>, ShamirError> {
        if threshold == 0 {
            return Err(ShamirError::InvalidThreshold);
        }
        if shares.len() < threshold {
            return Err(ShamirError::InsufficientShares);
        }

        let originals = &shares[..threshold];
        let xs: Vec<FieldElement> = originals.iter().map(|s| s.x.clone()).collect();
        self.check_ids(&xs)?;

        originals
            .iter()
            .map(|share| {
                Ok(ResharedShare {
                    original_x: share.x.clone(),
                    points: self.split(&share.y, new_threshold, new_participant_ids)?,
                })
            })
            .collect()
    }

    /// Recover the secret from re-shared sub-shares.
    ///
    /// Each `ResharedShare` must carry at least the new threshold of sub-shares.
    pub fn recover_reshared(&self, reshared: &[ResharedShare]) -> Result<FieldElement, ShamirError> {
        let originals = reshared
            .iter()
            .map(|r| {
                Ok(Point {
                    x: r.original_x.clone(),
                    y: self.recover(&r.points)?,
                })
            })
            .collect::<Result<Vec<_>, ShamirError>>()?;
        self.recover(&originals)
    }

    /// Participant ids must be canonical, nonzero and distinct
    fn check_ids(&self, ids: &[FieldElement]) -> Result<(), ShamirError> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !self.field.contains(id) {
                return Err(ShamirError::InvalidShare(
                    "participant id outside the field".into(),
                ));
            }
            if id.is_zero() {
                return Err(ShamirError::ZeroParticipantId);
            }
            if !seen.insert(id) {
                return Err(ShamirError::DuplicateParticipant);
            }
        }
        Ok(())
    }
}
