//! Event type definitions for progress reporting.

use crate::core::record::ImageId;
use crate::core::rehash::{RehashMode, SkipReason};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the hashing engine's batch operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Rehash run events
    Rehash(RehashEvent),
    /// Ingest run events
    Ingest(IngestEvent),
}

/// Events during a rehash run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RehashEvent {
    /// Targets have been selected
    Started { mode: RehashMode, targets: usize },
    /// New hashes were written and the image marked rehashed
    ImageHashed { image_id: ImageId },
    /// The image was left untouched
    ImageSkipped { image_id: ImageId, reason: SkipReason },
    /// Run finished
    Completed { processed: usize, skipped: usize },
}

/// Events while registering new uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestEvent {
    /// Files have been collected
    Started { total_files: usize },
    /// A file was hashed and registered
    ImageRegistered { image_id: ImageId, path: PathBuf },
    /// A file could not be hashed; nothing was stored for it
    FileRejected { path: PathBuf, message: String },
    /// Ingest finished
    Completed { registered: usize, rejected: usize },
}
