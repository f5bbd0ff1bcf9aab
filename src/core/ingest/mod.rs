//! # Ingest Module
//!
//! Registers new uploads: hashes the original and writes the image row and
//! its hash record together. A file that cannot be hashed leaves no row
//! behind.
//!
//! Paths are always relative to the storage root, which is how the rehash
//! job later finds the original again.

use crate::core::hasher::ImageHasher;
use crate::core::record::{ImageHashes, ImageId};
use crate::core::store::ImageStore;
use crate::error::{BoardHashError, HashError, StoreError};
use crate::events::{null_sender, Event, EventSender, IngestEvent};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Upload extensions picked up when walking a directory
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// A file that was not registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of registering a set of paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// New image ids with their stored relative paths
    pub registered: Vec<(ImageId, PathBuf)>,
    pub rejected: Vec<RejectedFile>,
}

/// Hashes and registers uploads under a storage root
pub struct Ingestor<'a> {
    store: &'a dyn ImageStore,
    hasher: &'a ImageHasher,
    storage_root: PathBuf,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn ImageStore,
        hasher: &'a ImageHasher,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            hasher,
            storage_root: storage_root.into(),
        }
    }

    /// Register one upload given its path relative to the storage root
    pub fn ingest(&self, relative: &Path) -> Result<ImageId, BoardHashError> {
        let hashes = self.hash_file(relative)?;
        let image_id = self.store.register_image(relative, Utc::now(), &hashes)?;

        debug!(image_id, path = %relative.display(), "Registered image");
        Ok(image_id)
    }

    /// Register files and directories without progress reporting
    pub fn ingest_paths(&self, paths: &[PathBuf]) -> Result<IngestReport, StoreError> {
        self.ingest_paths_with_events(paths, &null_sender())
    }

    /// Register files and directories (walked recursively)
    ///
    /// Hashing runs in parallel; rows are written one at a time in path
    /// order so ids follow the walk.
    pub fn ingest_paths_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<IngestReport, StoreError> {
        let mut report = IngestReport::default();
        let files = self.collect(paths, &mut report);

        events.send(Event::Ingest(IngestEvent::Started {
            total_files: files.len(),
        }));

        let hashed: Vec<(PathBuf, Result<ImageHashes, HashError>)> = files
            .into_par_iter()
            .map(|path| {
                let hashes = self.hash_file(&path);
                (path, hashes)
            })
            .collect();

        for (path, hashes) in hashed {
            match hashes {
                Ok(hashes) => {
                    let image_id = self.store.register_image(&path, Utc::now(), &hashes)?;
                    events.send(Event::Ingest(IngestEvent::ImageRegistered {
                        image_id,
                        path: path.clone(),
                    }));
                    report.registered.push((image_id, path));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Rejecting upload");
                    events.send(Event::Ingest(IngestEvent::FileRejected {
                        path: path.clone(),
                        message: e.to_string(),
                    }));
                    report.rejected.push(RejectedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            registered = report.registered.len(),
            rejected = report.rejected.len(),
            "Ingest complete"
        );
        events.send(Event::Ingest(IngestEvent::Completed {
            registered: report.registered.len(),
            rejected: report.rejected.len(),
        }));

        Ok(report)
    }

    fn hash_file(&self, relative: &Path) -> Result<ImageHashes, HashError> {
        let full_path = self.storage_root.join(relative);
        let bytes = std::fs::read(&full_path).map_err(|source| HashError::IoError {
            path: full_path,
            source,
        })?;
        self.hasher.fingerprint(&bytes)
    }

    /// Expand directories into image files, relative to the storage root
    fn collect(&self, paths: &[PathBuf], report: &mut IngestReport) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for path in paths {
            let full_path = self.storage_root.join(path);
            if full_path.is_file() {
                if seen.insert(path.clone()) {
                    files.push(path.clone());
                }
                continue;
            }

            let walker = WalkDir::new(&full_path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()));

            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_image(entry.path()) => {
                        let relative = entry
                            .path()
                            .strip_prefix(&self.storage_root)
                            .unwrap_or(entry.path())
                            .to_path_buf();
                        if seen.insert(relative.clone()) {
                            files.push(relative);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| path.clone());
                        report.rejected.push(RejectedFile {
                            path,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        files
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
