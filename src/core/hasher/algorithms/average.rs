//! Average Hash (aHash) implementation.
//!
//! aHash works by:
//! 1. Sampling the image to an N x N luminance matrix
//! 2. Computing the mean of all samples
//! 3. Emitting 1 for each sample at or above the mean, row-major
//! 4. Repeating/truncating the bits to 256 and packing them as hex
//!
//! The mean threshold makes it insensitive to uniform rescaling, but any
//! global tone or contrast change moves it.

use super::super::bits::{bits_to_hex, fit_to_hash_length};
use super::super::sampler::GrayMatrix;
use super::super::traits::{Fingerprint, HashAlgorithm, HashAlgorithmKind};
use crate::error::HashError;

/// Hash a luminance matrix of any shape
pub fn average_hash(matrix: &GrayMatrix) -> Result<String, HashError> {
    if matrix.is_empty() {
        return Err(HashError::EmptyMatrix);
    }

    let values = matrix.values();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let bits = values.iter().map(|&v| v >= mean).collect();

    Ok(bits_to_hex(&fit_to_hash_length(bits)?))
}

/// Average Hash (aHash) implementation
pub struct AverageHasher {
    /// Side length of the sampled matrix
    size: u32,
}

impl AverageHasher {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn hash(&self, matrix: &GrayMatrix) -> Result<String, HashError> {
        average_hash(matrix)
    }
}

impl HashAlgorithm for AverageHasher {
    fn sample_dimensions(&self) -> (u32, u32) {
        (self.size, self.size)
    }

    fn hash_matrix(&self, matrix: &GrayMatrix) -> Result<Fingerprint, HashError> {
        self.hash(matrix).map(Fingerprint::Single)
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Average
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comparator::hamming_distance;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn create_quadrant_image(size: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(size, size, |x, y| {
            if (x < size / 2) ^ (y < size / 2) {
                Rgb([230, 230, 230])
            } else {
                Rgb([20, 20, 20])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = AverageHasher::new(16);
        let image = create_quadrant_image(64);

        let hash1 = hasher.hash_image(&image).unwrap();
        let hash2 = hasher.hash_image(&image).unwrap();

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn thresholds_against_mean_row_major() {
        // Left half dark, right half bright
        let matrix = GrayMatrix::from_fn(16, 16, |x, _| if x < 8 { 10.0 } else { 200.0 });
        let hash = average_hash(&matrix).unwrap();

        // Each row is 0x00ff
        assert_eq!(hash, "00ff".repeat(16));
    }

    #[test]
    fn uniform_matrix_sets_every_bit() {
        // Every sample equals the mean, and equality counts as "at or above"
        let black = GrayMatrix::from_fn(16, 16, |_, _| 0.0);
        let white = GrayMatrix::from_fn(16, 16, |_, _| 255.0);

        assert_eq!(average_hash(&black).unwrap(), "f".repeat(64));
        assert_eq!(average_hash(&white).unwrap(), "f".repeat(64));
    }

    #[test]
    fn inverted_image_is_maximally_distant() {
        let matrix = GrayMatrix::from_fn(16, 16, |x, y| if (x + y) % 3 == 0 { 0.0 } else { 255.0 });
        let inverted = GrayMatrix::from_fn(16, 16, |x, y| 255.0 - matrix.get(x, y));

        let distance =
            hamming_distance(&average_hash(&matrix).unwrap(), &average_hash(&inverted).unwrap())
                .unwrap();
        assert_eq!(distance, 256);
    }

    #[test]
    fn small_matrix_repeats_to_256_bits() {
        // 8x8 gives 64 bits, repeated 4 times
        let matrix = GrayMatrix::from_fn(8, 8, |x, _| if x < 4 { 0.0 } else { 100.0 });
        let hash = average_hash(&matrix).unwrap();

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, "0f".repeat(32));
    }

    #[test]
    fn upscaled_copy_hashes_the_same() {
        let hasher = AverageHasher::new(16);
        let small = create_quadrant_image(64);
        let large = create_quadrant_image(128);

        let distance = hamming_distance(
            &hasher.hash(&sample_of(&small)).unwrap(),
            &hasher.hash(&sample_of(&large)).unwrap(),
        )
        .unwrap();

        assert!(distance <= 8, "upscale changed {} bits", distance);
    }

    fn sample_of(image: &DynamicImage) -> GrayMatrix {
        crate::core::hasher::PixelSampler::new()
            .sample_image(image, 16, 16)
            .unwrap()
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let matrix = GrayMatrix::from_fn(0, 0, |_, _| 0.0);
        assert!(matches!(average_hash(&matrix), Err(HashError::EmptyMatrix)));
    }

    #[test]
    fn kind_returns_average() {
        let hasher = AverageHasher::new(16);
        assert_eq!(hasher.kind(), HashAlgorithmKind::Average);
        assert_eq!(hasher.sample_dimensions(), (16, 16));
    }
}
