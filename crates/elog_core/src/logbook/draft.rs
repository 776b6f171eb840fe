//! Inputs and reports of the entry engine.

use chrono::{DateTime, FixedOffset};
use elog_codec::{Attribute, Digest, Encoding, MessageId};
use serde::Serialize;

/// The fields of a submitted entry.
///
/// Every `None` means "keep unchanged" when editing and "use the default"
/// when creating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Entry date. New entries default to now.
    pub date: Option<DateTime<FixedOffset>>,
    /// Attribute values. Reordered into schema order on submit.
    pub attributes: Option<Vec<Attribute>>,
    /// Body text.
    pub body: Option<String>,
    /// Body encoding.
    pub encoding: Option<Encoding>,
    /// Stored attachment names.
    pub attachments: Option<Vec<String>>,
    /// Parent id. Only used when creating; the parent must exist.
    pub in_reply_to: Option<MessageId>,
    /// New lock owner; `Some(None)` releases the lock.
    pub locked_by: Option<Option<String>>,
    /// Lock owner the editor last observed; checked before an edit.
    pub expected_lock: Option<Option<String>>,
}

impl Draft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the date.
    #[must_use]
    pub fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Adds an attribute value.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .get_or_insert_with(Vec::new)
            .push(Attribute::new(name, value));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the body encoding.
    #[must_use]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Sets the attachment list.
    #[must_use]
    pub fn attachments(mut self, names: Vec<String>) -> Self {
        self.attachments = Some(names);
        self
    }

    /// Makes the new entry a reply to `parent`.
    #[must_use]
    pub fn reply_to(mut self, parent: MessageId) -> Self {
        self.in_reply_to = Some(parent);
        self
    }

    /// Sets the lock owner.
    #[must_use]
    pub fn lock_owner(mut self, owner: impl Into<String>) -> Self {
        self.locked_by = Some(Some(owner.into()));
        self
    }

    /// Releases the lock.
    #[must_use]
    pub fn release_lock(mut self) -> Self {
        self.locked_by = Some(None);
        self
    }

    /// Requires the stored lock owner to be `owner` for the edit to proceed.
    #[must_use]
    pub fn expect_lock(mut self, owner: Option<String>) -> Self {
        self.expected_lock = Some(owner);
        self
    }
}

/// What a delete cascades to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete the entry's attachment files.
    pub attachments: bool,
    /// Delete every reply, recursively.
    pub replies: bool,
    /// Remove the entry from its parent's reply list.
    pub unlink_parent: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            attachments: true,
            replies: true,
            unlink_parent: true,
        }
    }
}

impl DeleteOptions {
    /// Deletes the record only, with no cascade.
    #[must_use]
    pub const fn entry_only() -> Self {
        Self {
            attachments: false,
            replies: false,
            unlink_parent: false,
        }
    }

    /// Sets whether attachments are deleted.
    #[must_use]
    pub const fn attachments(mut self, value: bool) -> Self {
        self.attachments = value;
        self
    }

    /// Sets whether replies are deleted.
    #[must_use]
    pub const fn replies(mut self, value: bool) -> Self {
        self.replies = value;
        self
    }

    /// Sets whether the parent's reply list is updated.
    #[must_use]
    pub const fn unlink_parent(mut self, value: bool) -> Self {
        self.unlink_parent = value;
        self
    }
}

/// A cascade step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    /// Entry the step was working on.
    pub id: MessageId,
    /// Error message.
    pub reason: String,
}

/// Outcome of a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Deleted ids, root first.
    pub deleted: Vec<MessageId>,
    /// Attachment files removed.
    pub attachments_removed: Vec<String>,
    /// Cascade steps that failed. The root never appears here; its failure
    /// fails the whole delete.
    pub failed: Vec<DeleteFailure>,
}

impl DeleteReport {
    /// Returns true if every cascade step succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A record's exact stored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Entry id.
    pub id: MessageId,
    /// Log file holding the record.
    pub file: String,
    /// Offset within the file.
    pub offset: u64,
    /// Digest of `bytes`.
    pub digest: Digest,
    /// The record bytes, marker to trailing newline.
    pub bytes: Vec<u8>,
}

/// One inconsistency found by [`super::Logbook::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyProblem {
    /// Log file.
    pub file: String,
    /// Byte offset of the problem.
    pub offset: u64,
    /// Entry concerned, if the problem belongs to an indexed record.
    pub id: Option<MessageId>,
    /// Description.
    pub message: String,
}

/// Result of re-hashing every record against the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Log files scanned.
    pub files: usize,
    /// Records checked.
    pub records: usize,
    /// Inconsistencies found.
    pub problems: Vec<VerifyProblem>,
}

impl VerifyReport {
    /// Returns true if no problem was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_builder() {
        let draft = Draft::new()
            .attribute("Author", "jdoe")
            .attribute("Subject", "pump")
            .body("text")
            .release_lock()
            .expect_lock(Some("jdoe@host".into()));

        assert_eq!(draft.attributes.as_ref().map(Vec::len), Some(2));
        assert_eq!(draft.body.as_deref(), Some("text"));
        assert_eq!(draft.locked_by, Some(None));
        assert_eq!(draft.expected_lock, Some(Some("jdoe@host".into())));
        assert!(draft.date.is_none());
    }

    #[test]
    fn delete_options() {
        let all = DeleteOptions::default();
        assert!(all.attachments && all.replies && all.unlink_parent);

        let some = DeleteOptions::entry_only().attachments(true);
        assert!(some.attachments);
        assert!(!some.replies);
        assert!(!some.unlink_parent);
    }
}
