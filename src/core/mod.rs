//! # Core Module
//!
//! The perceptual hashing and similarity engine.
//!
//! ## Modules
//! - `hasher` - Turns image bytes into aHash, dHash and pHash fingerprints
//! - `record` - The persisted hash record and its pHash block slices
//! - `comparator` - Hamming distances and the moderator similarity score
//! - `store` - Persists images and hash records
//! - `rehash` - Recomputes stored hashes from original uploads
//! - `ingest` - Registers and hashes new uploads

pub mod comparator;
pub mod hasher;
pub mod ingest;
pub mod record;
pub mod rehash;
pub mod store;

// Re-export commonly used types
pub use comparator::{hamming_distance, Comparator, ComparisonResult, ScoringMode};
pub use hasher::{HashAlgorithmKind, HashParams, ImageHasher};
pub use ingest::{IngestReport, Ingestor};
pub use record::{ImageHashRecord, ImageHashes, ImageId, PhashBlocks};
pub use rehash::{RehashConfig, RehashJob, RehashMode, RehashRun};
pub use store::{ImageStore, InMemoryStore, SqliteStore, StoredImage};
