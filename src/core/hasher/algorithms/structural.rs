//! Structural block hash.
//!
//! Splits an S x S matrix into a G x G grid of regions. Each region is
//! reduced to its edge-gradient magnitude `|dx| + |dy|` (forward
//! differences, zero on the region's last row and column), transformed
//! with its own DCT-II and thresholded against the median of its
//! low-frequency coefficients. The result is one 256-bit hash per region.
//!
//! This variant is not part of the persisted record; it is selectable
//! through [`HashAlgorithmKind::StructuralBlock`] for callers that want
//! region-level matching.

use super::super::bits::{bits_to_hex, fit_to_hash_length};
use super::super::dct::Dct2d;
use super::super::sampler::GrayMatrix;
use super::super::traits::{Fingerprint, HashAlgorithm, HashAlgorithmKind};
use super::perceptual::low_frequency_bits;
use crate::error::HashError;

/// Largest coefficient block kept per region (16 x 16 = 256 bits)
const MAX_LOW_FREQ: usize = 16;

/// Hash every region of an S x S matrix split into a `grid` x `grid` layout
pub fn structural_block_hash(matrix: &GrayMatrix, grid: usize) -> Result<Vec<String>, HashError> {
    StructuralBlockHasher::new(matrix.width() as u32, grid as u32).hash(matrix)
}

/// Edge magnitude by forward differences inside one region
fn edge_gradient(region: &GrayMatrix) -> Vec<f64> {
    let (width, height) = (region.width(), region.height());
    let mut gradient = Vec::with_capacity(width * height);

    for y in 0..height {
        for x in 0..width {
            let here = region.get(x, y);
            let dx = if x + 1 < width { region.get(x + 1, y) - here } else { 0.0 };
            let dy = if y + 1 < height { region.get(x, y + 1) - here } else { 0.0 };
            gradient.push(dx.abs() + dy.abs());
        }
    }

    gradient
}

/// Per-region structural hash
pub struct StructuralBlockHasher {
    /// Side length of the sampled matrix
    size: u32,
    /// Regions per side
    grid: u32,
    dct: Dct2d,
}

impl StructuralBlockHasher {
    pub fn new(size: u32, grid: u32) -> Self {
        let region = if grid == 0 { 0 } else { size / grid };
        Self {
            size,
            grid,
            dct: Dct2d::new(region as usize),
        }
    }

    pub fn hash(&self, matrix: &GrayMatrix) -> Result<Vec<String>, HashError> {
        let size = self.size as usize;
        let grid = self.grid as usize;

        if matrix.is_empty() {
            return Err(HashError::EmptyMatrix);
        }
        if grid == 0
            || size % grid != 0
            || size / grid < 2
            || matrix.width() != size
            || matrix.height() != size
        {
            return Err(HashError::InvalidDimensions {
                width: matrix.width() as u32,
                height: matrix.height() as u32,
            });
        }

        let region_size = size / grid;
        let low_freq = region_size.min(MAX_LOW_FREQ);
        let mut hashes = Vec::with_capacity(grid * grid);

        for gy in 0..grid {
            for gx in 0..grid {
                let region = matrix.region(
                    gx * region_size,
                    gy * region_size,
                    region_size,
                    region_size,
                );
                let coefficients = self.dct.transform(&edge_gradient(&region))?;
                let bits = low_frequency_bits(&coefficients, region_size, low_freq);
                hashes.push(bits_to_hex(&fit_to_hash_length(bits)?));
            }
        }

        Ok(hashes)
    }
}

impl HashAlgorithm for StructuralBlockHasher {
    fn sample_dimensions(&self) -> (u32, u32) {
        (self.size, self.size)
    }

    fn hash_matrix(&self, matrix: &GrayMatrix) -> Result<Fingerprint, HashError> {
        self.hash(matrix).map(Fingerprint::Regions)
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::StructuralBlock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(size: usize) -> GrayMatrix {
        GrayMatrix::from_fn(size, size, |x, y| ((x * x + y * 5) % 97) as f64)
    }

    #[test]
    fn produces_one_hash_per_region() {
        let hashes = structural_block_hash(&textured(64), 4).unwrap();

        assert_eq!(hashes.len(), 16);
        assert!(hashes.iter().all(|h| h.len() == 64));
    }

    #[test]
    fn is_deterministic() {
        let hasher = StructuralBlockHasher::new(64, 4);
        assert_eq!(
            hasher.hash(&textured(64)).unwrap(),
            hasher.hash(&textured(64)).unwrap()
        );
    }

    #[test]
    fn change_in_one_region_leaves_others_alone() {
        let base = textured(64);
        let edited = GrayMatrix::from_fn(64, 64, |x, y| {
            if x < 16 && y < 16 {
                255.0 - base.get(x, y) * 2.0
            } else {
                base.get(x, y)
            }
        });

        let before = structural_block_hash(&base, 4).unwrap();
        let after = structural_block_hash(&edited, 4).unwrap();

        assert_eq!(&before[1..], &after[1..]);
    }

    #[test]
    fn gradient_is_zero_for_flat_region() {
        let flat = GrayMatrix::from_fn(4, 4, |_, _| 42.0);
        assert!(edge_gradient(&flat).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn gradient_sums_absolute_differences() {
        let ramp = GrayMatrix::from_fn(3, 3, |x, y| (x * 2 + y * 3) as f64);
        let gradient = edge_gradient(&ramp);

        assert_eq!(gradient[0], 5.0);
        // last column: only dy
        assert_eq!(gradient[2], 3.0);
        // bottom-right corner
        assert_eq!(gradient[8], 0.0);
    }

    #[test]
    fn indivisible_grid_is_rejected() {
        assert!(structural_block_hash(&textured(30), 4).is_err());
    }

    #[test]
    fn exposed_as_regions_fingerprint() {
        let hasher = StructuralBlockHasher::new(64, 4);
        let fingerprint = hasher.hash_matrix(&textured(64)).unwrap();

        assert!(matches!(fingerprint, Fingerprint::Regions(ref r) if r.len() == 16));
        assert_eq!(hasher.kind(), HashAlgorithmKind::StructuralBlock);
    }
}
