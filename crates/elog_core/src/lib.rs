//! # elog Core
//!
//! Entry storage engine for elog logbooks.
//!
//! This crate provides:
//! - Log directory management (`YYMMDDa.log` day files)
//! - The in-memory time-ordered index and its process-wide registry
//! - The entry engine: submit, edit, retrieve, delete, move and lock
//! - Attachment storage
//!
//! ## Example
//!
//! ```no_run
//! use elog_core::{DeleteOptions, Draft, IndexRegistry, Logbook, LogbookConfig};
//!
//! let registry = IndexRegistry::new();
//! let book = Logbook::open(LogbookConfig::new("demo", "logbooks/demo"), &registry)?;
//!
//! let id = book.submit(None, Draft::new().attribute("Author", "jdoe").body("Hello"))?;
//! book.submit(Some(id), Draft::new().body("Hello2"))?;
//! assert_eq!(book.retrieve(id)?.body, "Hello2");
//!
//! book.delete(id, DeleteOptions::default())?;
//! # Ok::<(), elog_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attachments;
mod config;
mod error;
mod index;
mod logbook;
mod logdir;
mod registry;

pub use attachments::{
    attachment_file_name, AttachmentStore, DirAttachmentStore, MemoryAttachmentStore,
};
pub use config::LogbookConfig;
pub use error::{CoreError, CoreResult};
pub use index::{Index, IndexEntry};
pub use logbook::{
    DeleteFailure, DeleteOptions, DeleteReport, Draft, Logbook, RawRecord, VerifyProblem,
    VerifyReport,
};
pub use logdir::LogDir;
pub use registry::{IndexRegistry, SharedStore};

// Re-export the codec types callers need alongside the engine.
pub use elog_codec::{Attribute, AttributeSchema, Digest, Encoding, Entry, MessageId};
