//! Difference Hash (dHash) implementation.
//!
//! dHash works by:
//! 1. Sampling the image to (W+1) x H
//! 2. Comparing each pixel to the one to its right
//! 3. If the left pixel is strictly brighter, set the bit to 1, else 0
//!
//! Only the sign of each horizontal gradient is kept, so a uniform
//! brightness offset leaves the hash unchanged.

use super::super::bits::{bits_to_hex, fit_to_hash_length};
use super::super::sampler::GrayMatrix;
use super::super::traits::{Fingerprint, HashAlgorithm, HashAlgorithmKind};
use crate::error::HashError;

/// Hash a (W+1) x H luminance matrix into W x H gradient bits
pub fn difference_hash(matrix: &GrayMatrix) -> Result<String, HashError> {
    if matrix.is_empty() {
        return Err(HashError::EmptyMatrix);
    }
    if matrix.width() < 2 {
        return Err(HashError::InvalidDimensions {
            width: matrix.width() as u32,
            height: matrix.height() as u32,
        });
    }

    let mut bits = Vec::with_capacity((matrix.width() - 1) * matrix.height());
    for y in 0..matrix.height() {
        bits.extend(matrix.row(y).windows(2).map(|pair| pair[0] > pair[1]));
    }

    Ok(bits_to_hex(&fit_to_hash_length(bits)?))
}

/// Difference Hash (dHash) implementation
pub struct DifferenceHasher {
    /// Number of comparisons per row
    width: u32,
    /// Number of rows
    height: u32,
}

impl DifferenceHasher {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn hash(&self, matrix: &GrayMatrix) -> Result<String, HashError> {
        difference_hash(matrix)
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn sample_dimensions(&self) -> (u32, u32) {
        // One extra column to compute differences
        (self.width + 1, self.height)
    }

    fn hash_matrix(&self, matrix: &GrayMatrix) -> Result<Fingerprint, HashError> {
        self.hash(matrix).map(Fingerprint::Single)
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Difference
    }
}
