//! # Hasher Module
//!
//! Turns raw image bytes into compact perceptual fingerprints.
//!
//! ## Supported Algorithms
//! - **aHash (Average Hash)** - mean-thresholded N x N samples
//! - **dHash (Difference Hash)** - signs of horizontal gradients
//! - **pHash (Perceptual Hash)** - median-thresholded low DCT frequencies
//! - **Structural block hash** - optional, one DCT hash per region of an edge map
//!
//! Every algorithm emits exactly 256 bits packed as 64 lowercase hex
//! characters. All parameters are passed in explicitly through
//! [`HashParams`]; nothing reads global configuration.
//!
//! ## Example
//! ```rust,ignore
//! use board_hasher::core::hasher::{HashParams, ImageHasher};
//!
//! let hasher = ImageHasher::new(HashParams::new());
//! let hashes = hasher.fingerprint(&bytes)?;
//! println!("{}", hashes.phash);
//! ```

mod algorithms;
pub mod bits;
pub mod dct;
pub mod fast_decode;
pub mod sampler;
mod traits;

pub use algorithms::{
    average_hash, difference_hash, perceptual_hash, structural_block_hash, AverageHasher,
    DifferenceHasher, PerceptualHasher, StructuralBlockHasher,
};
pub use sampler::{GrayMatrix, PixelSampler};
pub use traits::{Fingerprint, HashAlgorithm, HashAlgorithmKind};

use crate::core::record::ImageHashes;
use crate::error::HashError;
use fast_decode::FastDecoder;
use image::DynamicImage;
use tracing::debug;

/// Sampling and transform parameters for every algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// aHash matrix side (N)
    pub average_size: u32,
    /// dHash comparisons per row (W); the sampled matrix is (W+1) x H
    pub difference_width: u32,
    /// dHash rows (H)
    pub difference_height: u32,
    /// pHash matrix side (S)
    pub perceptual_size: u32,
    /// pHash retained coefficient block side (L)
    pub perceptual_low_freq: u32,
    /// Structural hash matrix side
    pub structural_size: u32,
    /// Structural hash regions per side
    pub structural_grid: u32,
}

impl HashParams {
    /// Create parameters with the stored-hash defaults
    pub fn new() -> Self {
        Self {
            average_size: 16,
            difference_width: 16,
            difference_height: 16,
            perceptual_size: 32,
            perceptual_low_freq: 16,
            structural_size: 64,
            structural_grid: 4,
        }
    }

    /// Set the aHash matrix side
    pub fn average_size(mut self, size: u32) -> Self {
        self.average_size = size;
        self
    }

    /// Set the dHash grid (comparisons per row, rows)
    pub fn difference_size(mut self, width: u32, height: u32) -> Self {
        self.difference_width = width;
        self.difference_height = height;
        self
    }

    /// Set the pHash matrix side and retained block side
    ///
    /// Cost grows with the cube of `size`; keep it small for request paths.
    pub fn perceptual_size(mut self, size: u32, low_freq: u32) -> Self {
        self.perceptual_size = size;
        self.perceptual_low_freq = low_freq;
        self
    }

    /// Set the structural hash matrix side and grid
    pub fn structural_size(mut self, size: u32, grid: u32) -> Self {
        self.structural_size = size;
        self.structural_grid = grid;
        self
    }

    /// Build a single algorithm
    pub fn build(&self, kind: HashAlgorithmKind) -> Box<dyn HashAlgorithm> {
        match kind {
            HashAlgorithmKind::Average => Box::new(AverageHasher::new(self.average_size)),
            HashAlgorithmKind::Difference => Box::new(DifferenceHasher::new(
                self.difference_width,
                self.difference_height,
            )),
            HashAlgorithmKind::Perceptual => Box::new(PerceptualHasher::new(
                self.perceptual_size,
                self.perceptual_low_freq,
            )),
            HashAlgorithmKind::StructuralBlock => Box::new(StructuralBlockHasher::new(
                self.structural_size,
                self.structural_grid,
            )),
        }
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the persisted hash bundle (aHash, dHash, pHash and its blocks)
///
/// Upload and rehash both go through this type so the two paths can never
/// drift apart.
pub struct ImageHasher {
    average: AverageHasher,
    difference: DifferenceHasher,
    perceptual: PerceptualHasher,
    params: HashParams,
}

impl ImageHasher {
    pub fn new(params: HashParams) -> Self {
        Self {
            average: AverageHasher::new(params.average_size),
            difference: DifferenceHasher::new(params.difference_width, params.difference_height),
            perceptual: PerceptualHasher::new(params.perceptual_size, params.perceptual_low_freq),
            params,
        }
    }

    pub fn params(&self) -> &HashParams {
        &self.params
    }

    /// Decode raw bytes once and compute every stored hash
    pub fn fingerprint(&self, bytes: &[u8]) -> Result<ImageHashes, HashError> {
        let image = FastDecoder::decode(bytes)?;
        self.fingerprint_image(&image)
    }

    /// Compute every stored hash for a decoded image
    pub fn fingerprint_image(&self, image: &DynamicImage) -> Result<ImageHashes, HashError> {
        let mut sampler = PixelSampler::new();

        let (w, h) = self.average.sample_dimensions();
        let ahash = self.average.hash(&sampler.sample_image(image, w, h)?)?;

        let (w, h) = self.difference.sample_dimensions();
        let dhash = self.difference.hash(&sampler.sample_image(image, w, h)?)?;

        let (w, h) = self.perceptual.sample_dimensions();
        let phash = self.perceptual.hash(&sampler.sample_image(image, w, h)?)?;

        debug!(%ahash, %dhash, %phash, "Computed image fingerprint");

        ImageHashes::new(ahash, dhash, phash)
    }
}

impl Default for ImageHasher {
    fn default() -> Self {
        Self::new(HashParams::default())
    }
}
