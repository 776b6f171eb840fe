//! # elog Storage
//!
//! Byte-store backends for elog log files.
//!
//! Backends are **opaque byte stores** - they do not interpret the data they
//! hold. The entry record format, file naming and index bookkeeping all live
//! in `elog_codec` and `elog_core`.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, write, splice, truncate)
//! - No knowledge of record markers, dates or ids
//! - Must be `Send + Sync` for concurrent access
//! - [`StorageBackend::splice`] is the only operation that moves existing
//!   bytes, and it writes the moved tail before it shrinks the store
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use elog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"hello brave world").unwrap();
//! backend.splice(6..12, b"").unwrap();
//! assert_eq!(backend.read_at(0, 11).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{SpliceOutcome, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
