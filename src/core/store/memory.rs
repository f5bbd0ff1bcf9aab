//! In-memory store backend for testing.

use super::{shared_blocks, ImageStore, StoredImage};
use crate::core::record::{ImageHashRecord, ImageHashes, ImageId};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    next_id: ImageId,
    images: BTreeMap<ImageId, StoredImage>,
    hashes: BTreeMap<ImageId, ImageHashes>,
}

/// In-memory store backend
///
/// Useful for testing and scenarios where persistence isn't needed.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_id: 1,
                ..Tables::default()
            }),
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageStore for InMemoryStore {
    fn register_image(
        &self,
        path: &Path,
        created_at: DateTime<Utc>,
        hashes: &ImageHashes,
    ) -> Result<ImageId, StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;

        let id = tables.next_id;
        tables.next_id += 1;
        tables.images.insert(
            id,
            StoredImage {
                id,
                path: path.to_path_buf(),
                created_at,
                rehashed: false,
                rehashed_at: None,
            },
        );
        tables.hashes.insert(id, hashes.clone());

        Ok(id)
    }

    fn image(&self, image_id: ImageId) -> Result<Option<StoredImage>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.images.get(&image_id).cloned())
    }

    fn pending_rehash(&self, limit: usize) -> Result<Vec<StoredImage>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;

        let mut pending: Vec<StoredImage> = tables
            .images
            .values()
            .filter(|image| !image.rehashed)
            .cloned()
            .collect();
        pending.sort_by_key(|image| (image.created_at, image.id));
        pending.truncate(limit);

        Ok(pending)
    }

    fn mark_rehashed(&self, image_id: ImageId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;

        let image = tables
            .images
            .get_mut(&image_id)
            .ok_or(StoreError::ImageNotFound { image_id })?;
        image.rehashed = true;
        image.rehashed_at = Some(at);

        Ok(())
    }

    fn hash_record(&self, image_id: ImageId) -> Result<Option<ImageHashRecord>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables
            .hashes
            .get(&image_id)
            .map(|hashes| hashes.clone().into_record(image_id)))
    }

    fn upsert_hashes(&self, record: &ImageHashRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;

        if !tables.images.contains_key(&record.image_id) {
            return Err(StoreError::ImageNotFound {
                image_id: record.image_id,
            });
        }
        tables
            .hashes
            .insert(record.image_id, record.hashes.clone());

        Ok(())
    }

    fn delete_image(&self, image_id: ImageId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;

        tables.images.remove(&image_id);
        tables.hashes.remove(&image_id);
        Ok(())
    }

    fn block_candidates(
        &self,
        image_id: ImageId,
        min_shared: usize,
    ) -> Result<Vec<ImageId>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;

        let Some(reference) = tables.hashes.get(&image_id) else {
            return Ok(Vec::new());
        };

        Ok(tables
            .hashes
            .iter()
            .filter(|(id, _)| **id != image_id)
            .filter(|(_, hashes)| {
                shared_blocks(&reference.phash_blocks, &hashes.phash_blocks) >= min_shared
            })
            .map(|(id, _)| *id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hashes(phash: &str) -> ImageHashes {
        ImageHashes::new("00".repeat(32), "11".repeat(32), phash.to_string()).unwrap()
    }

    #[test]
    fn missing_record_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.hash_record(99).unwrap().is_none());
        assert!(store.image(99).unwrap().is_none());
    }

    #[test]
    fn register_stores_image_and_hashes() {
        let store = InMemoryStore::new();
        let id = store
            .register_image(Path::new("a.png"), Utc::now(), &hashes(&"ab".repeat(32)))
            .unwrap();

        let image = store.image(id).unwrap().unwrap();
        assert_eq!(image.path, PathBuf::from("a.png"));
        assert!(!image.rehashed);

        let record = store.hash_record(id).unwrap().unwrap();
        assert_eq!(record.image_id, id);
        assert_eq!(record.hashes.phash, "ab".repeat(32));
    }

    #[test]
    fn pending_is_oldest_first_and_limited() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let newer = store
            .register_image(Path::new("new.png"), now, &hashes(&"00".repeat(32)))
            .unwrap();
        let older = store
            .register_image(
                Path::new("old.png"),
                now - Duration::hours(1),
                &hashes(&"00".repeat(32)),
            )
            .unwrap();

        let pending = store.pending_rehash(1).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, older);

        store.mark_rehashed(older, now).unwrap();
        let pending = store.pending_rehash(10).unwrap();
        assert_eq!(pending.iter().map(|i| i.id).collect::<Vec<_>>(), vec![newer]);
    }

    #[test]
    fn upsert_requires_existing_image() {
        let store = InMemoryStore::new();
        let record = hashes(&"00".repeat(32)).into_record(5);

        assert!(matches!(
            store.upsert_hashes(&record),
            Err(StoreError::ImageNotFound { image_id: 5 })
        ));
    }

    #[test]
    fn delete_cascades_to_hashes() {
        let store = InMemoryStore::new();
        let id = store
            .register_image(Path::new("a.png"), Utc::now(), &hashes(&"00".repeat(32)))
            .unwrap();

        store.delete_image(id).unwrap();
        assert!(store.hash_record(id).unwrap().is_none());
    }

    #[test]
    fn candidates_share_blocks() {
        let store = InMemoryStore::new();
        let base = "0123456789abcdef".repeat(4);
        let near = format!("ffff{}", &base[4..]);
        let far = "f".repeat(64);

        let a = store.register_image(Path::new("a"), Utc::now(), &hashes(&base)).unwrap();
        let b = store.register_image(Path::new("b"), Utc::now(), &hashes(&near)).unwrap();
        store.register_image(Path::new("c"), Utc::now(), &hashes(&far)).unwrap();

        assert_eq!(store.block_candidates(a, 8).unwrap(), vec![b]);
        assert!(store.block_candidates(a, 16).unwrap().is_empty());
    }
}
