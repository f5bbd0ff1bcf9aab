//! Similarity scoring for moderator review.
//!
//! The scorer never decides whether two images are duplicates; it produces
//! numbers for a human to look at.

use super::hamming::hamming_distance;
use crate::core::hasher::bits::HASH_BITS;
use crate::core::record::{ImageHashRecord, ImageId};
use crate::error::HashError;
use serde::{Deserialize, Serialize};

/// How distances are folded into a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// `max(0, 100 - round((a + p + d) / 2))` where `p` is the mean block
    /// distance. The constants do not follow the hash widths; this is the
    /// formula moderators are used to, not a calibrated metric. Do not
    /// feed it into automated accept/reject decisions.
    #[default]
    Legacy,
    /// `100 * (1 - differing_bits / 768)` over all three full hashes
    Normalized,
}

/// Outcome of comparing two stored records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub image_a: ImageId,
    pub image_b: ImageId,
    pub ahash_distance: u32,
    pub dhash_distance: u32,
    /// Rounded mean of the sixteen block-pair distances
    pub phash_distance: u32,
    pub similarity_percent: u32,
    pub scoring: ScoringMode,
}

/// Folds aHash, dHash and pHash block distances into one percentage
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer {
    mode: ScoringMode,
}

impl SimilarityScorer {
    pub fn new(mode: ScoringMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    /// Compare two records (18 distance computations)
    pub fn score(
        &self,
        a: &ImageHashRecord,
        b: &ImageHashRecord,
    ) -> Result<ComparisonResult, HashError> {
        let ahash_distance = hamming_distance(&a.hashes.ahash, &b.hashes.ahash)?;
        let dhash_distance = hamming_distance(&a.hashes.dhash, &b.hashes.dhash)?;

        let block_distances = a
            .hashes
            .phash_blocks
            .iter()
            .zip(b.hashes.phash_blocks.iter())
            .map(|(x, y)| hamming_distance(x, y))
            .collect::<Result<Vec<u32>, _>>()?;
        let block_total: u32 = block_distances.iter().sum();
        let phash_distance =
            (f64::from(block_total) / block_distances.len() as f64).round() as u32;

        let similarity_percent = match self.mode {
            ScoringMode::Legacy => legacy_percent(ahash_distance, dhash_distance, phash_distance),
            ScoringMode::Normalized => {
                normalized_percent(ahash_distance + dhash_distance + block_total)
            }
        };

        Ok(ComparisonResult {
            image_a: a.image_id,
            image_b: b.image_id,
            ahash_distance,
            dhash_distance,
            phash_distance,
            similarity_percent,
            scoring: self.mode,
        })
    }
}

fn legacy_percent(ahash: u32, dhash: u32, phash: u32) -> u32 {
    let avg = f64::from(ahash + phash + dhash) / 2.0;
    // (avg / 100) * 100, without the float round trip
    let penalty = avg.round() as i64;
    (100 - penalty).max(0) as u32
}

fn normalized_percent(differing_bits: u32) -> u32 {
    let max_bits = (3 * HASH_BITS) as f64;
    (100.0 * (1.0 - f64::from(differing_bits) / max_bits))
        .round()
        .max(0.0) as u32
}
