//! Test fixtures and logbook helpers.
//!
//! Provides convenience functions for setting up scratch logbooks
//! and common test scenarios.

use chrono::{DateTime, FixedOffset};
use elog_codec::AttributeSchema;
use elog_core::{IndexRegistry, Logbook, LogbookConfig};
use std::path::Path;
use tempfile::TempDir;

/// A logbook in a temporary directory with automatic cleanup.
pub struct TestLogbook {
    /// The logbook instance.
    pub logbook: Logbook,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestLogbook {
    /// Creates a new permissive logbook named `name`.
    pub fn new(name: &str) -> Self {
        Self::with_schema(name, AttributeSchema::permissive())
    }

    /// Creates a new logbook with an attribute schema.
    pub fn with_schema(name: &str, schema: AttributeSchema) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = LogbookConfig::new(name, temp_dir.path().join(name))
            .schema(schema)
            .sync_writes(false);
        let logbook =
            Logbook::open(config, &IndexRegistry::new()).expect("Failed to open logbook");

        Self { logbook, temp_dir }
    }

    /// Returns the data directory.
    pub fn path(&self) -> &Path {
        self.logbook.dir().path()
    }

    /// Returns the temporary root, for siblings such as a second data
    /// directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens the same directory again through a fresh registry, so the new
    /// handle builds its own index from the files.
    pub fn reopen(&self) -> Logbook {
        let config = LogbookConfig::new(self.logbook.name(), self.path())
            .schema(self.logbook.schema().clone())
            .create_if_missing(false);
        Logbook::open(config, &IndexRegistry::new()).expect("Failed to reopen logbook")
    }
}

impl std::ops::Deref for TestLogbook {
    type Target = Logbook;

    fn deref(&self) -> &Self::Target {
        &self.logbook
    }
}

/// Runs a test with a temporary logbook.
///
/// # Example
///
/// ```rust,ignore
/// use elog_testkit::with_temp_logbook;
///
/// #[test]
/// fn my_test() {
///     with_temp_logbook(|book| {
///         book.submit(None, Draft::new().body("Hello")).unwrap();
///     });
/// }
/// ```
pub fn with_temp_logbook<F, R>(f: F) -> R
where
    F: FnOnce(&Logbook) -> R,
{
    let book = TestLogbook::new("test");
    f(&book.logbook)
}

/// Parses an RFC 2822 date, panicking on bad input.
pub fn date(text: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc2822(text).expect("Invalid RFC 2822 date")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use elog_core::{Draft, MessageId};

    /// Creates a logbook holding `count` entries, one hour apart.
    pub fn populated_logbook(count: usize) -> TestLogbook {
        let book = TestLogbook::new("populated");
        let start = date("Mon, 01 Jan 2024 08:00:00 +0000");

        for i in 0..count {
            let hours = i64::try_from(i).expect("count fits in i64");
            book.submit(
                None,
                Draft::new()
                    .date(start + chrono::Duration::hours(hours))
                    .attribute("Author", "testkit")
                    .body(format!("entry {i}")),
            )
            .expect("Failed to submit entry");
        }

        book
    }

    /// Creates a thread: a head entry, two replies, and a reply to the first
    /// reply. Returns the logbook and the ids in creation order.
    pub fn threaded_logbook() -> (TestLogbook, Vec<MessageId>) {
        let book = TestLogbook::new("threaded");
        let start = date("Mon, 01 Jan 2024 08:00:00 +0000");
        let at = |minutes: i64| start + chrono::Duration::minutes(minutes);

        let head = book
            .submit(None, Draft::new().date(at(0)).body("head"))
            .expect("Failed to submit head");
        let first = book
            .submit(None, Draft::new().date(at(1)).body("first").reply_to(head))
            .expect("Failed to submit reply");
        let second = book
            .submit(None, Draft::new().date(at(2)).body("second").reply_to(head))
            .expect("Failed to submit reply");
        let nested = book
            .submit(None, Draft::new().date(at(3)).body("nested").reply_to(first))
            .expect("Failed to submit reply");

        (book, vec![head, first, second, nested])
    }
}
