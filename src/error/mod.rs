//! # Error Module
//!
//! Error types for the hashing engine and its orchestration layers.
//!
//! ## Design Principles
//! - **Never panic** on image data - return errors instead
//! - **Scope failures** - a bad image or a bad hash never takes down a batch
//! - **Include context** - ids, paths, the offending value

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum BoardHashError {
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rehash error: {0}")]
    Rehash(#[from] RehashError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Errors that occur while sampling or hashing an image
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to decode image: {reason}")]
    DecodeError { reason: String },

    #[error("Invalid sample dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Cannot hash an empty matrix")]
    EmptyMatrix,

    #[error("Invalid hex hash {value:?}: {reason}")]
    InvalidHex { value: String, reason: String },

    #[error("Failed to read image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while comparing two stored records
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("No hash record for image {image_id}")]
    RecordNotFound { image_id: i64 },

    #[error("Stored hash is malformed: {0}")]
    InvalidHash(#[from] HashError),

    #[error("Failed to load hash record: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by the hash record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Store lock poisoned at {path}. Restart the process and try again.")]
    Corrupted { path: PathBuf },

    #[error("Image {image_id} does not exist")]
    ImageNotFound { image_id: i64 },
}

/// Errors that abort a whole rehash run
///
/// Per-image failures are reported in the run itself, never here.
#[derive(Error, Debug)]
pub enum RehashError {
    #[error("Store failure during rehash: {0}")]
    Store(#[from] StoreError),

    /// A write failed partway through; `processed` were already committed
    #[error("Rehash interrupted after processing {processed:?}: {source}")]
    Interrupted {
        processed: Vec<i64>,
        #[source]
        source: StoreError,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, BoardHashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_hex_includes_value() {
        let error = HashError::InvalidHex {
            value: "zz".to_string(),
            reason: "not a hex digit".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("zz"));
        assert!(message.contains("not a hex digit"));
    }

    #[test]
    fn record_not_found_includes_id() {
        let error = CompareError::RecordNotFound { image_id: 42 };
        assert!(error.to_string().contains("42"));
    }

    #[test]
    fn interrupted_rehash_lists_committed_ids() {
        let error = RehashError::Interrupted {
            processed: vec![3, 5],
            source: StoreError::QueryFailed("disk full".to_string()),
        };
        let message = error.to_string();
        assert!(message.contains("[3, 5]"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn store_error_converts_to_top_level() {
        let error: BoardHashError = StoreError::QueryFailed("boom".to_string()).into();
        assert!(matches!(error, BoardHashError::Store(_)));
        assert!(error.to_string().contains("boom"));
    }
}
