//! # Rehash Module
//!
//! Recomputes stored hashes from the original upload bytes.
//!
//! Used after a change to the hashing parameters, or to repair records
//! written by an older build. Every image is hashed from its persisted
//! original, never from a resized or cached copy.
//!
//! ## Failure scoping
//! A missing or undecodable original skips that image; the run carries on
//! and the image stays pending. Only store failures abort a run, and the
//! resulting [`RehashError::Interrupted`] names the images already written.
//!
//! ## Stalled batches
//! Skipped images are reselected by every later batch, oldest first. Once a
//! full page of them piles up, newer images are never reached and each run
//! processes nothing. [`RehashRun::stalled`] reports this; the originals
//! have to be restored or the rows deleted before batches make progress.

use crate::core::hasher::ImageHasher;
use crate::core::record::ImageId;
use crate::core::store::{ImageStore, StoredImage};
use crate::error::{RehashError, StoreError};
use crate::events::{null_sender, Event, EventSender, RehashEvent};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Which images a run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RehashMode {
    /// One image that already has a hash record
    Single(ImageId),
    /// The oldest page of images not yet rehashed
    Batch,
}

/// Why an image was left untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    ImageNotFound,
    NoHashRecord,
    MissingOriginal { path: PathBuf },
    Unreadable { reason: String },
    DecodeFailed { reason: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ImageNotFound => write!(f, "image does not exist"),
            SkipReason::NoHashRecord => write!(f, "image has no hash record to rehash"),
            SkipReason::MissingOriginal { path } => {
                write!(f, "original file missing: {}", path.display())
            }
            SkipReason::Unreadable { reason } => write!(f, "original unreadable: {reason}"),
            SkipReason::DecodeFailed { reason } => write!(f, "decode failed: {reason}"),
        }
    }
}

/// An image a run did not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedImage {
    pub image_id: ImageId,
    pub reason: SkipReason,
}

/// Outcome of one rehash run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RehashRun {
    pub mode: RehashMode,
    /// Images selected for the run
    pub targets: usize,
    /// Images whose hashes were rewritten, in processing order
    pub processed: Vec<ImageId>,
    pub skipped: Vec<SkippedImage>,
}

impl RehashRun {
    /// Why nothing was processed, if nothing was
    ///
    /// Single mode has no batch to fall back into, so callers should show
    /// this instead of an empty list.
    pub fn failure_reason(&self) -> Option<String> {
        if !self.processed.is_empty() {
            return None;
        }
        match self.skipped.first() {
            Some(skipped) => Some(format!(
                "no images processed: image {} skipped ({})",
                skipped.image_id, skipped.reason
            )),
            None => Some("no images processed: nothing pending".to_string()),
        }
    }

    /// A batch that selected images but could rehash none of them
    pub fn stalled(&self) -> bool {
        self.mode == RehashMode::Batch && self.targets > 0 && self.processed.is_empty()
    }
}

/// Rehash run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehashConfig {
    /// Images per batch run
    pub batch_size: usize,
    /// Directory stored image paths are relative to
    pub storage_root: PathBuf,
}

impl RehashConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            batch_size: 10,
            storage_root: storage_root.into(),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

impl Default for RehashConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Recomputes and upserts hash records
pub struct RehashJob<'a> {
    store: &'a dyn ImageStore,
    hasher: &'a ImageHasher,
    config: RehashConfig,
}

impl<'a> RehashJob<'a> {
    pub fn new(store: &'a dyn ImageStore, hasher: &'a ImageHasher, config: RehashConfig) -> Self {
        Self {
            store,
            hasher,
            config,
        }
    }

    pub fn config(&self) -> &RehashConfig {
        &self.config
    }

    /// Run without progress reporting
    pub fn run(&self, mode: RehashMode) -> Result<RehashRun, RehashError> {
        self.run_with_events(mode, &null_sender())
    }

    /// Run and report each image through `events`
    pub fn run_with_events(
        &self,
        mode: RehashMode,
        events: &EventSender,
    ) -> Result<RehashRun, RehashError> {
        let mut run = RehashRun {
            mode,
            targets: 0,
            processed: Vec::new(),
            skipped: Vec::new(),
        };

        let targets = match self.select(mode)? {
            Ok(targets) => targets,
            Err(skipped) => {
                run.targets = 1;
                events.send(Event::Rehash(RehashEvent::Started { mode, targets: 1 }));
                self.skip(&mut run, skipped.image_id, skipped.reason, events);
                return Ok(self.finish(run, events));
            }
        };

        run.targets = targets.len();
        events.send(Event::Rehash(RehashEvent::Started {
            mode,
            targets: targets.len(),
        }));

        for image in targets {
            let outcome = match self.rehash_one(&image) {
                Ok(outcome) => outcome,
                Err(source) => {
                    error!(
                        image_id = image.id,
                        processed = ?run.processed,
                        error = %source,
                        "Rehash interrupted by store failure"
                    );
                    return Err(RehashError::Interrupted {
                        processed: run.processed,
                        source,
                    });
                }
            };
            match outcome {
                Ok(()) => {
                    debug!(image_id = image.id, "Rehashed image");
                    run.processed.push(image.id);
                    events.send(Event::Rehash(RehashEvent::ImageHashed { image_id: image.id }));
                }
                Err(reason) => self.skip(&mut run, image.id, reason, events),
            }
        }

        Ok(self.finish(run, events))
    }

    /// Resolve the target list; the inner `Err` is a single-mode precondition failure
    fn select(
        &self,
        mode: RehashMode,
    ) -> Result<Result<Vec<StoredImage>, SkippedImage>, RehashError> {
        match mode {
            RehashMode::Batch => Ok(Ok(self.store.pending_rehash(self.config.batch_size)?)),
            RehashMode::Single(image_id) => {
                let Some(image) = self.store.image(image_id)? else {
                    return Ok(Err(SkippedImage {
                        image_id,
                        reason: SkipReason::ImageNotFound,
                    }));
                };
                if self.store.hash_record(image_id)?.is_none() {
                    return Ok(Err(SkippedImage {
                        image_id,
                        reason: SkipReason::NoHashRecord,
                    }));
                }
                Ok(Ok(vec![image]))
            }
        }
    }

    /// Hash one image from its original; the inner `Err` skips it
    fn rehash_one(&self, image: &StoredImage) -> Result<Result<(), SkipReason>, StoreError> {
        let bytes = match read_original(&self.config.storage_root, &image.path) {
            Ok(bytes) => bytes,
            Err(reason) => return Ok(Err(reason)),
        };

        let hashes = match self.hasher.fingerprint(&bytes) {
            Ok(hashes) => hashes,
            Err(e) => {
                return Ok(Err(SkipReason::DecodeFailed {
                    reason: e.to_string(),
                }))
            }
        };

        let record = hashes.into_record(image.id);
        let written = self
            .store
            .upsert_hashes(&record)
            .and_then(|()| self.store.mark_rehashed(image.id, Utc::now()));

        match written {
            Ok(()) => Ok(Ok(())),
            // Deleted between selection and write
            Err(StoreError::ImageNotFound { .. }) => Ok(Err(SkipReason::ImageNotFound)),
            Err(e) => Err(e),
        }
    }

    fn skip(
        &self,
        run: &mut RehashRun,
        image_id: ImageId,
        reason: SkipReason,
        events: &EventSender,
    ) {
        warn!(image_id, %reason, "Skipping image during rehash");
        events.send(Event::Rehash(RehashEvent::ImageSkipped {
            image_id,
            reason: reason.clone(),
        }));
        run.skipped.push(SkippedImage { image_id, reason });
    }

    fn finish(&self, run: RehashRun, events: &EventSender) -> RehashRun {
        if run.stalled() {
            warn!(
                targets = run.targets,
                "Batch rehashed nothing; the oldest pending images cannot be rehashed"
            );
        }
        info!(
            mode = ?run.mode,
            processed = run.processed.len(),
            skipped = run.skipped.len(),
            "Rehash run complete"
        );
        events.send(Event::Rehash(RehashEvent::Completed {
            processed: run.processed.len(),
            skipped: run.skipped.len(),
        }));
        run
    }
}

fn read_original(storage_root: &Path, path: &Path) -> Result<Vec<u8>, SkipReason> {
    let full_path = storage_root.join(path);
    std::fs::read(&full_path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SkipReason::MissingOriginal { path: full_path },
        _ => SkipReason::Unreadable {
            reason: format!("{}: {e}", full_path.display()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{ImageHashRecord, ImageHashes};
    use crate::core::store::InMemoryStore;
    use crate::events::EventChannel;
    use chrono::Duration;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::fs;
    use tempfile::TempDir;

    fn stale_hashes() -> ImageHashes {
        ImageHashes::new("00".repeat(32), "00".repeat(32), "00".repeat(32)).unwrap()
    }

    fn write_png(dir: &Path, name: &str, seed: u32) {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(40, 40, |x, y| {
            let v = ((x * 5 + y * 9 + seed * 17) % 256) as u8;
            Rgb([v, 255 - v, v / 3])
        }));
        img.save_with_format(dir.join(name), ImageFormat::Png).unwrap();
    }

    /// Registers `count` images, oldest first, and writes their originals
    fn seed(store: &InMemoryStore, root: &Path, count: u32) -> Vec<ImageId> {
        let start = Utc::now() - Duration::hours(i64::from(count));
        (0..count)
            .map(|i| {
                let name = format!("{i}.png");
                write_png(root, &name, i);
                store
                    .register_image(
                        Path::new(&name),
                        start + Duration::hours(i64::from(i)),
                        &stale_hashes(),
                    )
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn batch_skips_missing_original_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 5);
        fs::remove_file(temp_dir.path().join("2.png")).unwrap();

        let job = RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()));
        let run = job.run(RehashMode::Batch).unwrap();

        assert_eq!(run.targets, 5);
        assert_eq!(run.processed, vec![ids[0], ids[1], ids[3], ids[4]]);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].image_id, ids[2]);
        assert!(matches!(
            run.skipped[0].reason,
            SkipReason::MissingOriginal { .. }
        ));

        // The skipped image keeps its old hashes and stays pending
        assert_eq!(
            store.hash_record(ids[2]).unwrap().unwrap().hashes,
            stale_hashes()
        );
        let pending = store.pending_rehash(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[2]);
    }

    /// Delegates to an in-memory store but fails writes for one image
    struct FailingWrites {
        inner: InMemoryStore,
        fail_for: ImageId,
    }

    impl ImageStore for FailingWrites {
        fn register_image(
            &self,
            path: &Path,
            created_at: chrono::DateTime<Utc>,
            hashes: &ImageHashes,
        ) -> Result<ImageId, StoreError> {
            self.inner.register_image(path, created_at, hashes)
        }

        fn image(&self, image_id: ImageId) -> Result<Option<StoredImage>, StoreError> {
            self.inner.image(image_id)
        }

        fn pending_rehash(&self, limit: usize) -> Result<Vec<StoredImage>, StoreError> {
            self.inner.pending_rehash(limit)
        }

        fn mark_rehashed(
            &self,
            image_id: ImageId,
            at: chrono::DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.mark_rehashed(image_id, at)
        }

        fn hash_record(&self, image_id: ImageId) -> Result<Option<ImageHashRecord>, StoreError> {
            self.inner.hash_record(image_id)
        }

        fn upsert_hashes(&self, record: &ImageHashRecord) -> Result<(), StoreError> {
            if record.image_id == self.fail_for {
                return Err(StoreError::QueryFailed("database is locked".to_string()));
            }
            self.inner.upsert_hashes(record)
        }

        fn delete_image(&self, image_id: ImageId) -> Result<(), StoreError> {
            self.inner.delete_image(image_id)
        }

        fn block_candidates(
            &self,
            image_id: ImageId,
            min_shared: usize,
        ) -> Result<Vec<ImageId>, StoreError> {
            self.inner.block_candidates(image_id, min_shared)
        }
    }

    #[test]
    fn default_batch_takes_ten_oldest() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 11);

        let run = RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()))
            .run(RehashMode::Batch)
            .unwrap();

        assert_eq!(run.targets, 10);
        assert_eq!(run.processed, ids[..10].to_vec());
        let pending = store.pending_rehash(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[10]);
    }

    #[test]
    fn page_of_missing_originals_stalls_later_batches() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 11);
        for i in 0..10 {
            fs::remove_file(temp_dir.path().join(format!("{i}.png"))).unwrap();
        }
        let job = RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()));

        for _ in 0..2 {
            let run = job.run(RehashMode::Batch).unwrap();
            assert_eq!(run.targets, 10);
            assert!(run.processed.is_empty());
            assert!(run.stalled());
        }
        assert!(!store.image(ids[10]).unwrap().unwrap().rehashed);

        // A single run still reaches the newer image directly
        let single = job.run(RehashMode::Single(ids[10])).unwrap();
        assert_eq!(single.processed, vec![ids[10]]);
        assert!(!single.stalled());
    }

    #[test]
    fn store_failure_reports_images_already_written() {
        let temp_dir = TempDir::new().unwrap();
        let inner = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&inner, temp_dir.path(), 4);
        let store = FailingWrites {
            inner,
            fail_for: ids[2],
        };

        let result = RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()))
            .run(RehashMode::Batch);

        match result {
            Err(RehashError::Interrupted { processed, source }) => {
                assert_eq!(processed, vec![ids[0], ids[1]]);
                assert!(matches!(source, StoreError::QueryFailed(_)));
            }
            other => panic!("expected an interrupted run, got {other:?}"),
        }
        assert!(store.image(ids[1]).unwrap().unwrap().rehashed);
        assert!(!store.image(ids[2]).unwrap().unwrap().rehashed);
        assert!(!store.image(ids[3]).unwrap().unwrap().rehashed);
    }

    #[test]
    fn batch_respects_page_size_and_age() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 4);

        let config = RehashConfig::new(temp_dir.path()).batch_size(3);
        let run = RehashJob::new(&store, &hasher, config)
            .run(RehashMode::Batch)
            .unwrap();

        assert_eq!(run.processed, ids[..3].to_vec());
        assert!(store.image(ids[0]).unwrap().unwrap().rehashed);
        assert!(!store.image(ids[3]).unwrap().unwrap().rehashed);
    }

    #[test]
    fn rehash_writes_hashes_from_original_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 1);

        RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()))
            .run(RehashMode::Single(ids[0]))
            .unwrap();

        let bytes = fs::read(temp_dir.path().join("0.png")).unwrap();
        let expected = hasher.fingerprint(&bytes).unwrap();
        assert_eq!(store.hash_record(ids[0]).unwrap().unwrap().hashes, expected);
    }

    #[test]
    fn rehash_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 1);
        let job = RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()));

        job.run(RehashMode::Single(ids[0])).unwrap();
        let first = store.hash_record(ids[0]).unwrap().unwrap();
        job.run(RehashMode::Single(ids[0])).unwrap();
        let second = store.hash_record(ids[0]).unwrap().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn single_mode_reports_unknown_image() {
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();

        let run = RehashJob::new(&store, &hasher, RehashConfig::default())
            .run(RehashMode::Single(77))
            .unwrap();

        assert!(run.processed.is_empty());
        assert_eq!(run.skipped[0].reason, SkipReason::ImageNotFound);
        assert!(run.failure_reason().unwrap().contains("77"));
    }

    #[test]
    fn single_mode_reports_decode_failure() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.png"), b"not an image").unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let id = store
            .register_image(Path::new("broken.png"), Utc::now(), &stale_hashes())
            .unwrap();

        let run = RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()))
            .run(RehashMode::Single(id))
            .unwrap();

        assert!(run.processed.is_empty());
        assert!(matches!(
            run.skipped[0].reason,
            SkipReason::DecodeFailed { .. }
        ));
        assert!(run.failure_reason().is_some());
    }

    #[test]
    fn empty_batch_is_not_an_error() {
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();

        let run = RehashJob::new(&store, &hasher, RehashConfig::default())
            .run(RehashMode::Batch)
            .unwrap();

        assert_eq!(run.targets, 0);
        assert!(run.processed.is_empty());
        assert!(run.skipped.is_empty());
    }

    #[test]
    fn run_with_events_reports_each_image() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let hasher = ImageHasher::default();
        let ids = seed(&store, temp_dir.path(), 2);
        fs::remove_file(temp_dir.path().join("1.png")).unwrap();

        let (sender, receiver) = EventChannel::new();
        RehashJob::new(&store, &hasher, RehashConfig::new(temp_dir.path()))
            .run_with_events(RehashMode::Batch, &sender)
            .unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            Event::Rehash(RehashEvent::Started { targets: 2, .. })
        ));
        assert!(matches!(
            events[1],
            Event::Rehash(RehashEvent::ImageHashed { image_id }) if image_id == ids[0]
        ));
        assert!(matches!(
            events[2],
            Event::Rehash(RehashEvent::ImageSkipped { image_id, .. }) if image_id == ids[1]
        ));
        assert!(matches!(
            events[3],
            Event::Rehash(RehashEvent::Completed { processed: 1, skipped: 1 })
        ));
    }
}
