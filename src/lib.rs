//! # Board Hasher
//!
//! Perceptual image hashing and similarity scoring for an image board.
//!
//! Every upload is fingerprinted three ways (aHash, dHash, pHash). When two
//! uploads look alike, moderators see the per-algorithm Hamming distances
//! and a similarity percentage; the engine itself never accepts or rejects
//! anything.
//!
//! ## Architecture
//! - `core` - Hash algorithms, comparison, persistence and the rehash job
//! - `events` - Progress reporting for batch runs
//! - `error` - Error types, scoped to one image or one comparison

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{BoardHashError, Result};

/// Initialize tracing for the library
///
/// Called once by the binary; the filter comes from `RUST_LOG`.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
