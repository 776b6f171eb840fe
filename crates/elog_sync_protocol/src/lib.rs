//! # elog Sync Protocol
//!
//! Wire formats of logbook mirroring.
//!
//! This crate provides:
//! - [`DigestList`]: the banner-prefixed `ID:<id> MD5:<hex>` list a peer serves
//! - [`MirrorCache`]: the `ID<id>: <hex>` file remembering the last pass
//! - [`MirrorRequest`]: the requests a mirror pass sends, and their URLs
//! - [`EntryTransfer`]: one record plus attachments on the wire
//! - [`Conflict`]: an entry changed on both sides
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod conflict;
mod digest_list;
mod error;
mod request;
mod transfer;

pub use cache::MirrorCache;
pub use conflict::Conflict;
pub use digest_list::{DigestList, BANNER_PREFIX, PROTOCOL_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use request::{Method, MirrorRequest};
pub use transfer::{AttachmentBlob, EntryTransfer};

// Re-export for convenience
pub use url::Url;
