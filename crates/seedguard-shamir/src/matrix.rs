//! Vandermonde matrices and LUP inversion over a prime field
//!
//! Interpolation at x = 0 is done by inverting the Vandermonde matrix of the share
//! x-coordinates: row 0 of the inverse holds the weights that recover the constant
//! term of the polynomial. The full inverse is kept so callers re-sharing to a new
//! participant set can reuse it.

use crate::field::{FieldElement, PrimeField};
use crate::ShamirError;

/// Dense square or rectangular matrix of field elements (row-major)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: Vec<Vec<FieldElement>>,
}

/// In-place LU factors with the row permutation applied during pivoting.
///
/// `lu` stores L below the diagonal (unit diagonal implied) and U on and above it.
/// `permutation[i]` is the original row that ended up in row `i`.
#[derive(Debug, Clone)]
pub struct LupDecomposition {
    lu: Matrix,
    permutation: Vec<usize>,
}

/// Build the `xs.len() × threshold` Vandermonde matrix: row `i` is
/// `[xs[i]^0, xs[i]^1, …, xs[i]^(threshold-1)]`.
pub fn vandermonde(field: &PrimeField, xs: &[FieldElement], threshold: usize) -> Matrix {
    let rows = xs
        .iter()
        .map(|x| {
            let mut row = Vec::with_capacity(threshold);
            let mut power = field.one();
            for _ in 0..threshold {
                row.push(power.clone());
                power = field.mul(&power, x);
            }
            row
        })
        .collect();
    Matrix { rows }
}

impl Matrix {
    pub fn from_rows(rows: Vec<Vec<FieldElement>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<FieldElement>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> Option<&[FieldElement]> {
        self.rows.get(i).map(|r| r.as_slice())
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    fn is_square(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.rows.len())
    }

    /// `self · v`
    pub fn mul_vector(
        &self,
        field: &PrimeField,
        v: &[FieldElement],
    ) -> Result<Vec<FieldElement>, ShamirError> {
        if self.num_cols() != v.len() {
            return Err(ShamirError::InvalidShare(format!(
                "dimension mismatch: {} columns, vector of {}",
                self.num_cols(),
                v.len()
            )));
        }
        Ok(self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(v)
                    .fold(field.zero(), |acc, (a, b)| field.add(&acc, &field.mul(a, b)))
            })
            .collect())
    }

    /// Partial-pivoted LU decomposition.
    ///
    /// The pivot is the row with the largest integer representative in the current
    /// column.
    ///
    /// A column with no nonzero candidate means the matrix is singular, which for a
    /// Vandermonde matrix means two participants share an x-coordinate.
    pub fn decompose_lup(&self, field: &PrimeField) -> Result<LupDecomposition, ShamirError> {
        if !self.is_square() {
            return Err(ShamirError::InvalidShare("matrix is not square".into()));
        }

        let n = self.rows.len();
        let mut a = self.rows.clone();
        let mut permutation: Vec<usize> = (0..n).collect();

        for i in 0..n {
            let mut max_value = field.zero();
            let mut max_row = i;
            for (k, row) in a.iter().enumerate().skip(i) {
                if row[i] > max_value {
                    max_value = row[i].clone();
                    max_row = k;
                }
            }

            if max_value.is_zero() {
                return Err(ShamirError::DuplicateParticipant);
            }

            if max_row != i {
                permutation.swap(i, max_row);
                a.swap(i, max_row);
            }

            let pivot_inv = field.inverse(&a[i][i])?;
            for j in (i + 1)..n {
                let factor = field.mul(&a[j][i], &pivot_inv);
                for k in (i + 1)..n {
                    let delta = field.mul(&factor, &a[i][k]);
                    a[j][k] = field.sub(&a[j][k], &delta);
                }
                a[j][i] = factor;
            }
        }

        Ok(LupDecomposition {
            lu: Matrix { rows: a },
            permutation,
        })
    }

    /// Full inverse via LUP decomposition
    pub fn invert(&self, field: &PrimeField) -> Result<Matrix, ShamirError> {
        self.decompose_lup(field)?.invert(field)
    }
}

impl LupDecomposition {
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn lu(&self) -> &Matrix {
        &self.lu
    }

    /// Solve `A · X = I` column by column with forward then back substitution.
    pub fn invert(&self, field: &PrimeField) -> Result<Matrix, ShamirError> {
        let a = &self.lu.rows;
        let n = a.len();
        let mut inv = vec![vec![field.zero(); n]; n];

        for j in 0..n {
            // Forward: L · y = P · e_j
            for i in 0..n {
                let mut value = if self.permutation[i] == j {
                    field.one()
                } else {
                    field.zero()
                };
                for k in 0..i {
                    value = field.sub(&value, &field.mul(&a[i][k], &inv[k][j]));
                }
                inv[i][j] = value;
            }

            // Back: U · x = y
            for i in (0..n).rev() {
                let mut value = inv[i][j].clone();
                for k in (i + 1)..n {
                    value = field.sub(&value, &field.mul(&a[i][k], &inv[k][j]));
                }
                inv[i][j] = field.div(&value, &a[i][i])?;
            }
        }

        Ok(Matrix { rows: inv })
    }
}
