//! # elog Testkit
//!
//! Test utilities for elog.
//!
//! This crate provides:
//! - Test fixtures and logbook helpers
//! - Property-based test generators using proptest
//! - A mirror pair harness: a local logbook wired to an in-process peer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use elog_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_logbook() {
//!     with_temp_logbook(|book| {
//!         let id = book.submit(None, Draft::new().body("Hello")).unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mirror;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::mirror::*;
    pub use elog_core::{DeleteOptions, Draft, Logbook};
}

pub use fixtures::*;
pub use generators::*;
pub use mirror::*;
