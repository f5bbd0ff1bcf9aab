//! # Events Module
//!
//! Progress reporting for rehash and ingest runs.
//!
//! ## Design
//! Batch operations emit events through a channel; the CLI subscribes and
//! renders a progress bar. Library callers that do not care pass
//! [`null_sender`].
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Rehash(RehashEvent::ImageSkipped { image_id, reason }) = event {
//!             eprintln!("skipped {image_id}: {reason}");
//!         }
//!     }
//! });
//!
//! job.run_with_events(RehashMode::Batch, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
