//! # board-hash CLI
//!
//! Command-line front end for the board image hashing engine.
//!
//! ## Usage
//! ```bash
//! board-hash hash upload.jpg
//! board-hash --storage-root /srv/board ingest src/2024
//! board-hash compare 12 40 --scoring normalized --output json
//! board-hash rehash --batch-size 25
//! ```

mod cli;

use board_hasher::Result;

fn main() -> Result<()> {
    board_hasher::init_tracing();
    cli::run()
}
