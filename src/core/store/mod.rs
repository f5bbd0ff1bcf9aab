//! # Store Module
//!
//! Persists images and their hash records.
//!
//! ## Backends
//! - `SqliteStore` - Persistent storage using SQLite
//! - `InMemoryStore` - For testing and one-shot runs

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::ImageStore;

use crate::core::record::{ImageId, PhashBlocks};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An image row as the hashing engine sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub id: ImageId,
    /// Location of the original upload, relative to the storage root
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub rehashed: bool,
    pub rehashed_at: Option<DateTime<Utc>>,
}

/// Number of block positions where two pHash decompositions agree
pub(crate) fn shared_blocks(a: &PhashBlocks, b: &PhashBlocks) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_blocks_counts_positional_matches() {
        let a = PhashBlocks::decompose(&"0123456789abcdef".repeat(4)).unwrap();
        let b = PhashBlocks::decompose(&format!("0123ffff{}", "89abcdef".repeat(7))).unwrap();

        // Matching positions: 0, 2, 3, 6, 7, 10, 11, 14, 15
        assert_eq!(shared_blocks(&a, &b), 9);
        assert_eq!(shared_blocks(&a, &a), 16);
    }
}
