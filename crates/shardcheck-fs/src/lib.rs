//! Atomic file placement primitives.
//!
//! Manifests and store payloads are written once per round and read by
//! another process, so every write goes through a temp-file-and-rename.

mod atomic;
mod error;

pub use atomic::{AtomicWriteOptions, atomic_read, atomic_write, ensure_dir, list_files, read_to_string};
pub use error::{Error, Result};
