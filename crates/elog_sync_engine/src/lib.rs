//! # elog Sync Engine
//!
//! Keeps two independently writable copies of a logbook convergent.
//!
//! This crate provides:
//! - The mirror pass (fetching digests → reconciling → persisting the cache)
//! - Per-id classification from local, cached and remote digests
//! - Conflict reporting, collision renumbering, two-phase deletions
//! - Retry with exponential backoff for the digest list fetch
//! - HTTP transport abstraction with loopback and `reqwest` clients
//! - A periodic scheduler on tokio
//!
//! ## Architecture
//!
//! Entries are compared only by digest. The mirror cache remembers the
//! remote digest of every id at the end of the last pass, which tells a
//! one-sided change (transfer it) from a two-sided one (report it):
//!
//! 1. Fetch the peer's digest list; failure aborts before any local change
//! 2. Load the mirror cache
//! 3. Classify and act on every id in local ∪ cache ∪ remote
//! 4. Store the cache; unresolved ids keep their old line
//!
//! ## Key Invariants
//!
//! - Conflicts are never resolved automatically
//! - A failed transfer never aborts the pass; the id is retried next pass
//! - Passes for the same logbook and peer never overlap
//! - Pulled records are stored byte for byte, so digests agree afterwards

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod guard;
mod http;
mod plan;
mod scheduler;
mod state;
mod transport;

pub use config::{DeletionPolicy, RetryConfig, SyncConfig};
pub use engine::{PassOptions, SyncEngine};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{ClientError, HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use plan::{classify, Action};
pub use scheduler::{spawn_configured, spawn_periodic};
pub use state::{
    Deletion, Operation, Renumbered, Side, SyncReport, SyncState, SyncStats, TransferFailure,
};
pub use transport::{MirrorTransport, MockTransport};
