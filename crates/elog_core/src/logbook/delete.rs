//! Deleting records.

use super::{decode_record, DeleteFailure, DeleteOptions, DeleteReport, Logbook};
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use elog_codec::{Entry, MessageId};
use tracing::{debug, info, warn};

impl Logbook {
    /// Deletes an entry and, depending on `options`, its replies,
    /// attachments and parent back-reference.
    ///
    /// Replies are collected on an explicit worklist. A failure while
    /// deleting the root fails the whole call; a failure further down the
    /// cascade is logged, recorded in the report and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the entry doesn't exist (deleting
    /// twice is harmless), or the error that stopped the root delete.
    pub fn delete(&self, id: MessageId, options: DeleteOptions) -> CoreResult<DeleteReport> {
        self.write_with_rebuild(|index| self.delete_locked(index, id, options))
    }

    fn delete_locked(
        &self,
        index: &mut Index,
        id: MessageId,
        options: DeleteOptions,
    ) -> CoreResult<DeleteReport> {
        if !index.contains(id) {
            return Err(CoreError::NotFound { id });
        }

        let mut report = DeleteReport::default();
        let mut worklist = vec![id];
        let mut root_parent = None;

        while let Some(current) = worklist.pop() {
            if current != id && (report.deleted.contains(&current) || !index.contains(current)) {
                continue;
            }
            match self.delete_one_locked(index, current) {
                Ok(entry) => {
                    if current == id {
                        root_parent = entry.in_reply_to;
                    }
                    report.deleted.push(current);
                    if options.attachments {
                        self.remove_attachments(&entry, &mut report);
                    }
                    if options.replies {
                        worklist.extend(entry.reply_to.iter().rev().copied());
                    }
                }
                Err(e) if current == id => return Err(e),
                Err(e) => {
                    warn!(logbook = %self.name(), id = current, error = %e, "cascade delete failed");
                    report.failed.push(DeleteFailure {
                        id: current,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if options.unlink_parent {
            if let Some(parent) = root_parent.filter(|p| index.contains(*p)) {
                let unlinked =
                    self.rewrite_locked(index, parent, |p| p.reply_to.retain(|&reply| reply != id));
                if let Err(e) = unlinked {
                    warn!(logbook = %self.name(), id, parent, error = %e, "could not unlink from parent");
                    report.failed.push(DeleteFailure {
                        id: parent,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            logbook = %self.name(),
            id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "deleted entry"
        );
        Ok(report)
    }

    /// Splices one record out of its file and drops it from the index.
    ///
    /// Returns the decoded entry so callers can cascade.
    pub(super) fn delete_one_locked(&self, index: &mut Index, id: MessageId) -> CoreResult<Entry> {
        let (location, bytes) = self.load_record(index, id)?;
        let entry = decode_record(&location, &bytes)?;

        let outcome = self.dir().splice(&location.file, location.range(), &[])?;
        index.remove(id);
        index.shift_offsets(&location.file, location.offset + location.len, outcome.delta);
        if outcome.new_size == 0 {
            self.remove_empty_file(&location.file);
        }

        debug!(logbook = %self.name(), id, file = %location.file, "removed record");
        Ok(entry)
    }

    fn remove_attachments(&self, entry: &Entry, report: &mut DeleteReport) {
        for name in &entry.attachments {
            match self.attachments().delete(name) {
                Ok(true) => report.attachments_removed.push(name.clone()),
                Ok(false) => {}
                Err(e) => {
                    warn!(logbook = %self.name(), id = entry.id, attachment = %name, error = %e, "could not delete attachment");
                }
            }
        }
    }
}
