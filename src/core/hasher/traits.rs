//! Trait definitions for perceptual hashing.

use super::fast_decode::FastDecoder;
use super::sampler::{GrayMatrix, PixelSampler};
use crate::error::HashError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Available hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithmKind {
    /// Average Hash (aHash) - mean-thresholded samples
    Average,
    /// Difference Hash (dHash) - horizontal gradient signs
    Difference,
    /// Perceptual Hash (pHash) - median-thresholded low DCT frequencies
    Perceptual,
    /// Structural block hash - one DCT hash per region of an edge map
    StructuralBlock,
}

impl HashAlgorithmKind {
    /// Get a human-readable description of the algorithm
    pub fn description(&self) -> &'static str {
        match self {
            HashAlgorithmKind::Average => {
                "Average Hash (aHash) - Fast comparison based on average brightness"
            }
            HashAlgorithmKind::Difference => {
                "Difference Hash (dHash) - Compares brightness gradients between pixels"
            }
            HashAlgorithmKind::Perceptual => {
                "Perceptual Hash (pHash) - DCT-based, robust to recompression and resizing"
            }
            HashAlgorithmKind::StructuralBlock => {
                "Structural Block Hash - Per-region DCT of edge gradients"
            }
        }
    }
}

impl std::fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithmKind::Average => write!(f, "aHash"),
            HashAlgorithmKind::Difference => write!(f, "dHash"),
            HashAlgorithmKind::Perceptual => write!(f, "pHash"),
            HashAlgorithmKind::StructuralBlock => write!(f, "blockHash"),
        }
    }
}

/// Output of a hash algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fingerprint {
    /// One 64-character hex hash for the whole image
    Single(String),
    /// One 64-character hex hash per image region, region-major
    Regions(Vec<String>),
}

impl Fingerprint {
    /// All hex hashes in this fingerprint
    pub fn hashes(&self) -> &[String] {
        match self {
            Fingerprint::Single(hash) => std::slice::from_ref(hash),
            Fingerprint::Regions(hashes) => hashes,
        }
    }
}

/// Trait for hash algorithm implementations
pub trait HashAlgorithm: Send + Sync {
    /// Width and height of the luminance matrix this algorithm consumes
    fn sample_dimensions(&self) -> (u32, u32);

    /// Hash an already-sampled luminance matrix
    fn hash_matrix(&self, matrix: &GrayMatrix) -> Result<Fingerprint, HashError>;

    /// Sample a decoded image at [`Self::sample_dimensions`] and hash it
    fn hash_image(&self, image: &DynamicImage) -> Result<Fingerprint, HashError> {
        let (width, height) = self.sample_dimensions();
        let matrix = PixelSampler::new().sample_image(image, width, height)?;
        self.hash_matrix(&matrix)
    }

    /// Decode raw bytes and hash them
    fn hash_bytes(&self, bytes: &[u8]) -> Result<Fingerprint, HashError> {
        let image = FastDecoder::decode(bytes)?;
        self.hash_image(&image)
    }

    /// Get the algorithm kind
    fn kind(&self) -> HashAlgorithmKind;
}
