//! Capture Module
//!
//! Reading exported captures:
//! - `hash`: content hashes embedded in node names
//! - `indexer`: the hash index of one capture layer
//! - `discovery`: capture layers inside a captures folder

mod discovery;
mod hash;
mod indexer;

pub use discovery::{capture_dir, discover_captures, is_capture_folder, CaptureEntry};
pub use hash::{AssetKind, ContentHash, HashPattern, HASH_LEN};
pub use indexer::{HashIndex, HashIndexer};
