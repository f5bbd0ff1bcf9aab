//! Store backend trait definition.

use super::StoredImage;
use crate::core::record::{ImageHashRecord, ImageHashes, ImageId};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Keyed persistence for images and their hash records
pub trait ImageStore: Send + Sync {
    /// Register a new image together with its hashes in one transaction
    fn register_image(
        &self,
        path: &Path,
        created_at: DateTime<Utc>,
        hashes: &ImageHashes,
    ) -> Result<ImageId, StoreError>;

    /// Look up an image row
    fn image(&self, image_id: ImageId) -> Result<Option<StoredImage>, StoreError>;

    /// Images not yet rehashed, oldest first, at most `limit`
    fn pending_rehash(&self, limit: usize) -> Result<Vec<StoredImage>, StoreError>;

    /// Flag an image as rehashed at `at`
    fn mark_rehashed(&self, image_id: ImageId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Get the hash record of an image
    fn hash_record(&self, image_id: ImageId) -> Result<Option<ImageHashRecord>, StoreError>;

    /// Insert or overwrite every hash field of a record at once
    ///
    /// Fails with [`StoreError::ImageNotFound`] when the image row is gone.
    fn upsert_hashes(&self, record: &ImageHashRecord) -> Result<(), StoreError>;

    /// Delete an image; its hash record goes with it
    fn delete_image(&self, image_id: ImageId) -> Result<(), StoreError>;

    /// Other images sharing at least `min_shared` pHash blocks with
    /// `image_id` at the same block index, ascending by id
    fn block_candidates(
        &self,
        image_id: ImageId,
        min_shared: usize,
    ) -> Result<Vec<ImageId>, StoreError>;
}
