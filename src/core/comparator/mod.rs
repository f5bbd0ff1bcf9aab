//! # Comparator Module
//!
//! Compares stored hash records for moderator review.
//!
//! ## How It Works
//! 1. Load both records from the store
//! 2. Hamming distance of the whole aHash and dHash
//! 3. Hamming distance of each of the sixteen pHash block pairs, averaged
//! 4. Fold the distances into a similarity percentage
//!
//! | Distance | Meaning (256-bit hash) |
//! |----------|------------------------|
//! | 0        | Identical fingerprint  |
//! | 1-10     | Near-identical         |
//! | 11-40    | Related                |
//! | 41+      | Different              |
//!
//! The result is advisory: nothing here accepts or rejects an upload.

mod hamming;
mod scorer;

pub use hamming::hamming_distance;
pub use scorer::{ComparisonResult, ScoringMode, SimilarityScorer};

use crate::core::record::{ImageHashRecord, ImageId};
use crate::core::store::ImageStore;
use crate::error::CompareError;
use tracing::debug;

/// Loads records from a store and scores them
pub struct Comparator<'a> {
    store: &'a dyn ImageStore,
    scorer: SimilarityScorer,
}

impl<'a> Comparator<'a> {
    pub fn new(store: &'a dyn ImageStore, mode: ScoringMode) -> Self {
        Self {
            store,
            scorer: SimilarityScorer::new(mode),
        }
    }

    /// Compare two images by id
    pub fn compare(&self, a: ImageId, b: ImageId) -> Result<ComparisonResult, CompareError> {
        let record_a = self.load(a)?;
        let record_b = self.load(b)?;

        let result = self.scorer.score(&record_a, &record_b)?;
        debug!(
            image_a = a,
            image_b = b,
            similarity = result.similarity_percent,
            "Compared images"
        );
        Ok(result)
    }

    /// Compare `image_id` against every block candidate, most similar first
    pub fn compare_candidates(
        &self,
        image_id: ImageId,
        min_shared_blocks: usize,
    ) -> Result<Vec<ComparisonResult>, CompareError> {
        let reference = self.load(image_id)?;

        let mut results = self
            .store
            .block_candidates(image_id, min_shared_blocks)?
            .into_iter()
            .map(|candidate| {
                let record = self.load(candidate)?;
                Ok(self.scorer.score(&reference, &record)?)
            })
            .collect::<Result<Vec<_>, CompareError>>()?;

        results.sort_by(|x, y| {
            y.similarity_percent
                .cmp(&x.similarity_percent)
                .then(x.image_b.cmp(&y.image_b))
        });
        Ok(results)
    }

    fn load(&self, image_id: ImageId) -> Result<ImageHashRecord, CompareError> {
        self.store
            .hash_record(image_id)?
            .ok_or(CompareError::RecordNotFound { image_id })
    }
}
