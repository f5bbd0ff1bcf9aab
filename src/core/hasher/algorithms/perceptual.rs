//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to extract
//! frequency information from the image:
//! 1. Sample the image to S x S
//! 2. Apply the 2-D DCT-II
//! 3. Keep the top-left L x L block (low frequencies, DC included)
//! 4. Emit 1 for each kept coefficient strictly above their median
//!
//! Energy concentrates in the low frequencies, which makes the hash
//! robust to mild recompression, resizing and small edits. It is the most
//! expensive of the three algorithms and belongs in batch work.

use super::super::bits::{bits_to_hex, fit_to_hash_length};
use super::super::dct::Dct2d;
use super::super::sampler::GrayMatrix;
use super::super::traits::{Fingerprint, HashAlgorithm, HashAlgorithmKind};
use super::median;
use crate::error::HashError;

/// Hash an S x S matrix using its top-left `low_freq` x `low_freq` coefficients
pub fn perceptual_hash(
    matrix: &GrayMatrix,
    size: usize,
    low_freq: usize,
) -> Result<String, HashError> {
    PerceptualHasher::new(size as u32, low_freq as u32).hash(matrix)
}

/// Threshold the top-left `low_freq` block of `size`-square coefficients
pub(super) fn low_frequency_bits(coefficients: &[f64], size: usize, low_freq: usize) -> Vec<bool> {
    let block: Vec<f64> = (0..low_freq)
        .flat_map(|u| coefficients[u * size..u * size + low_freq].iter().copied())
        .collect();

    let threshold = median(&block);
    block.iter().map(|&c| c > threshold).collect()
}

/// Perceptual Hash (pHash) implementation using DCT
pub struct PerceptualHasher {
    /// Side length of the sampled matrix
    size: u32,
    /// Side length of the retained coefficient block
    low_freq: u32,
    dct: Dct2d,
}

impl PerceptualHasher {
    pub fn new(size: u32, low_freq: u32) -> Self {
        Self {
            size,
            low_freq,
            dct: Dct2d::new(size as usize),
        }
    }

    pub fn hash(&self, matrix: &GrayMatrix) -> Result<String, HashError> {
        let size = self.size as usize;
        let low_freq = self.low_freq as usize;

        if matrix.is_empty() {
            return Err(HashError::EmptyMatrix);
        }
        if matrix.width() != size || matrix.height() != size || low_freq == 0 || low_freq > size
        {
            return Err(HashError::InvalidDimensions {
                width: matrix.width() as u32,
                height: matrix.height() as u32,
            });
        }

        let coefficients = self.dct.transform(matrix.values())?;
        let bits = low_frequency_bits(&coefficients, size, low_freq);

        Ok(bits_to_hex(&fit_to_hash_length(bits)?))
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn sample_dimensions(&self) -> (u32, u32) {
        (self.size, self.size)
    }

    fn hash_matrix(&self, matrix: &GrayMatrix) -> Result<Fingerprint, HashError> {
        self.hash(matrix).map(Fingerprint::Single)
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Perceptual
    }
}
