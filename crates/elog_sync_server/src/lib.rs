//! # elog Sync Server
//!
//! Peer side of logbook mirroring.
//!
//! This crate provides:
//! - Digest lists with the protocol banner
//! - Downloads of stored records with their attachments
//! - Verbatim storage of pushed records
//! - Deletes requested by a peer's pass
//!
//! # Architecture
//!
//! The server answers requests against the same [`elog_core::Logbook`] the
//! local users write to, so mirrored entries go through the same index and
//! locking as local edits. The HTTP socket loop is not part of this crate;
//! a front end hands every request to [`MirrorServer::handle_request`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::{MirrorServer, Response};
