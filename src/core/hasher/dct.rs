//! Two-dimensional DCT-II.
//!
//! Coefficient `(u, v)` of an S x S input is
//!
//! ```text
//! 0.25 * c(u) * c(v) * sum_{i,j} p[i][j] * cos((2i+1)u*pi / 2S) * cos((2j+1)v*pi / 2S)
//! ```
//!
//! with `c(0) = 1/sqrt(2)` and `c(k) = 1` otherwise. `i` runs over rows and
//! `j` over columns. The 0.25 factor is fixed regardless of S, so hashes stay
//! comparable with values stored by the direct-summation implementation.
//!
//! The sum is evaluated as two 1-D passes over a precomputed cosine table,
//! O(S^3) instead of O(S^4).

use crate::error::HashError;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Precomputed DCT-II for a fixed square size
#[derive(Debug, Clone)]
pub struct Dct2d {
    size: usize,
    /// `cosines[k * size + n] = cos((2n+1) k pi / 2S)`
    cosines: Vec<f64>,
}

impl Dct2d {
    pub fn new(size: usize) -> Self {
        let mut cosines = Vec::with_capacity(size * size);
        for k in 0..size {
            for n in 0..size {
                cosines.push(((2 * n + 1) as f64 * k as f64 * PI / (2 * size) as f64).cos());
            }
        }
        Self { size, cosines }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Transform `size * size` row-major samples.
    ///
    /// The result is row-major over `(u, v)`: index `u * size + v`.
    pub fn transform(&self, samples: &[f64]) -> Result<Vec<f64>, HashError> {
        let n = self.size;
        if n == 0 || samples.len() != n * n {
            return Err(HashError::InvalidDimensions {
                width: n as u32,
                height: (samples.len() / n.max(1)) as u32,
            });
        }

        // Pass 1: along each row, j -> v
        let mut rows = vec![0.0; n * n];
        for i in 0..n {
            let row = &samples[i * n..(i + 1) * n];
            for v in 0..n {
                let basis = &self.cosines[v * n..(v + 1) * n];
                rows[i * n + v] = row.iter().zip(basis).map(|(p, c)| p * c).sum();
            }
        }

        // Pass 2: down each column, i -> u
        let mut coefficients = vec![0.0; n * n];
        for u in 0..n {
            let basis = &self.cosines[u * n..(u + 1) * n];
            let cu = if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };
            for v in 0..n {
                let cv = if v == 0 { FRAC_1_SQRT_2 } else { 1.0 };
                let sum: f64 = (0..n).map(|i| basis[i] * rows[i * n + v]).sum();
                coefficients[u * n + v] = 0.25 * cu * cv * sum;
            }
        }

        Ok(coefficients)
    }
}
