//! The entry engine.
//!
//! A [`Logbook`] is a named view on a shared data directory. All mutations
//! run under the directory's index write lock, so the file operation and the
//! index update are never observed half-done by another logbook on the same
//! directory. When the bytes the index points at turn out not to be the
//! expected record, the index is rebuilt from disk and the operation is tried
//! once more.

mod delete;
mod draft;
mod write;

pub use draft::{
    DeleteFailure, DeleteOptions, DeleteReport, Draft, RawRecord, VerifyProblem, VerifyReport,
};

use crate::attachments::{attachment_file_name, AttachmentStore, DirAttachmentStore};
use crate::config::LogbookConfig;
use crate::error::{CoreError, CoreResult};
use crate::index::{Index, IndexEntry};
use crate::logdir::LogDir;
use crate::registry::{IndexRegistry, SharedStore};
use chrono::{DateTime, FixedOffset};
use elog_codec::{decode_entry, AttributeSchema, Digest, Entry, MessageId};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// A logbook: entry storage plus attachments, over a shared index.
pub struct Logbook {
    config: LogbookConfig,
    store: Arc<SharedStore>,
    attachments: Arc<dyn AttachmentStore>,
}

impl fmt::Debug for Logbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logbook")
            .field("name", &self.config.name)
            .field("data_dir", &self.store.dir().path())
            .finish_non_exhaustive()
    }
}

impl Logbook {
    /// Opens a logbook, storing attachments in the configured directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be opened or indexed,
    /// including [`CoreError::LegacyFormat`].
    pub fn open(config: LogbookConfig, registry: &IndexRegistry) -> CoreResult<Self> {
        let attachments = Arc::new(DirAttachmentStore::new(config.attachment_path()));
        Self::open_with_attachments(config, registry, attachments)
    }

    /// Opens a logbook with a custom attachment store.
    ///
    /// # Errors
    ///
    /// Same as [`Logbook::open`].
    pub fn open_with_attachments(
        config: LogbookConfig,
        registry: &IndexRegistry,
        attachments: Arc<dyn AttachmentStore>,
    ) -> CoreResult<Self> {
        let store = registry.open(&config.data_dir, config.create_if_missing, config.sync_writes)?;
        info!(
            logbook = %config.name,
            dir = %store.dir().path().display(),
            entries = store.read().len(),
            "opened logbook"
        );
        Ok(Self {
            config,
            store,
            attachments,
        })
    }

    /// Returns the logbook name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LogbookConfig {
        &self.config
    }

    /// Returns the attribute schema.
    #[must_use]
    pub fn schema(&self) -> &AttributeSchema {
        &self.config.schema
    }

    /// Returns the data directory.
    #[must_use]
    pub fn dir(&self) -> &LogDir {
        self.store.dir()
    }

    /// Returns the attachment store.
    #[must_use]
    pub fn attachments(&self) -> &Arc<dyn AttachmentStore> {
        &self.attachments
    }

    /// Returns true if both logbooks share one index.
    #[must_use]
    pub fn shares_index_with(&self, other: &Logbook) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Returns true if the logbook has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Returns true if an entry with this id exists.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.store.read().contains(id)
    }

    /// Returns the highest id, if any.
    #[must_use]
    pub fn max_id(&self) -> Option<MessageId> {
        self.store.read().max_id()
    }

    /// Returns every id in time order.
    #[must_use]
    pub fn ids(&self) -> Vec<MessageId> {
        self.store.read().ids()
    }

    /// Returns every entry's digest.
    #[must_use]
    pub fn digests(&self) -> BTreeMap<MessageId, Digest> {
        self.store.read().digests()
    }

    /// Returns a copy of the index, in time order.
    #[must_use]
    pub fn index_entries(&self) -> Vec<IndexEntry> {
        self.store.read().iter().cloned().collect()
    }

    /// Returns the index entry for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no entry has this id.
    pub fn index_entry(&self, id: MessageId) -> CoreResult<IndexEntry> {
        self.store.read().lookup(id).cloned()
    }

    /// Returns the first entry in time order.
    #[must_use]
    pub fn first(&self, heads_only: bool) -> Option<MessageId> {
        self.store.read().first(heads_only)
    }

    /// Returns the last entry in time order.
    #[must_use]
    pub fn last(&self, heads_only: bool) -> Option<MessageId> {
        self.store.read().last(heads_only)
    }

    /// Returns the entry after `from` in time order.
    #[must_use]
    pub fn next(&self, from: MessageId, heads_only: bool) -> Option<MessageId> {
        self.store.read().next(from, heads_only)
    }

    /// Returns the entry before `from` in time order.
    #[must_use]
    pub fn prev(&self, from: MessageId, heads_only: bool) -> Option<MessageId> {
        self.store.read().prev(from, heads_only)
    }

    /// Reads and decodes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no entry has this id, or
    /// [`CoreError::CorruptRecord`] if the record is still unreadable after
    /// an index rebuild.
    pub fn retrieve(&self, id: MessageId) -> CoreResult<Entry> {
        self.read_with_rebuild(|index| {
            let (entry, bytes) = self.load_record(index, id)?;
            decode_record(&entry, &bytes)
        })
    }

    /// Reads an entry's exact stored bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Logbook::retrieve`].
    pub fn raw_record(&self, id: MessageId) -> CoreResult<RawRecord> {
        self.read_with_rebuild(|index| {
            let (entry, bytes) = self.load_record(index, id)?;
            Ok(RawRecord {
                id,
                file: entry.file,
                offset: entry.offset,
                digest: entry.digest,
                bytes,
            })
        })
    }

    /// Stores an uploaded attachment for an entry dated `date`.
    ///
    /// Returns the stored name to list in the entry's attachments.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment store rejects the write.
    pub fn store_attachment(
        &self,
        date: &DateTime<FixedOffset>,
        original: &str,
        data: &[u8],
    ) -> CoreResult<String> {
        let name = attachment_file_name(date, original);
        self.attachments.put(&name, data)?;
        Ok(name)
    }

    /// Rescans the data directory and replaces the shared index.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn rebuild_index(&self) -> CoreResult<()> {
        let mut index = self.store.write();
        self.store.rebuild(&mut *index)
    }

    /// Re-hashes every record and compares it with the index.
    ///
    /// Also reports bytes no index entry covers, which are records that
    /// failed to decode when the index was built.
    ///
    /// # Errors
    ///
    /// Returns an error if a log file cannot be read.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let index = self.store.read();
        let dir = self.store.dir();
        let mut report = VerifyReport::default();

        let files = dir.list_log_files()?;
        let present: HashSet<&str> = files.iter().map(String::as_str).collect();

        for entry in index.iter() {
            if !present.contains(entry.file.as_str()) {
                report.problems.push(VerifyProblem {
                    file: entry.file.clone(),
                    offset: entry.offset,
                    id: Some(entry.id),
                    message: "log file is missing".to_string(),
                });
            }
        }

        for file in &files {
            report.files += 1;
            let buf = dir.read_all(file)?;
            let mut cursor = 0u64;

            for entry in index.file_entries(file) {
                report.records += 1;
                let problem = |offset: u64, message: String| VerifyProblem {
                    file: file.clone(),
                    offset,
                    id: Some(entry.id),
                    message,
                };

                if entry.offset > cursor {
                    report.problems.push(VerifyProblem {
                        file: file.clone(),
                        offset: cursor,
                        id: None,
                        message: format!("{} unindexed bytes", entry.offset - cursor),
                    });
                } else if entry.offset < cursor {
                    report
                        .problems
                        .push(problem(entry.offset, "overlaps the previous record".into()));
                }
                cursor = cursor.max(entry.offset + entry.len);

                let Some(bytes) = usize::try_from(entry.offset)
                    .ok()
                    .zip(usize::try_from(entry.offset + entry.len).ok())
                    .and_then(|(start, end)| buf.get(start..end))
                else {
                    report
                        .problems
                        .push(problem(entry.offset, "record extends past end of file".into()));
                    continue;
                };

                let actual = Digest::of(bytes);
                if actual != entry.digest {
                    report.problems.push(problem(
                        entry.offset,
                        format!("digest mismatch: index {} disk {actual}", entry.digest),
                    ));
                }
                if let Err(e) = decode_entry(bytes, Some(entry.id)) {
                    report.problems.push(problem(entry.offset, e.to_string()));
                }
            }

            let size = buf.len() as u64;
            if cursor < size {
                report.problems.push(VerifyProblem {
                    file: file.clone(),
                    offset: cursor,
                    id: None,
                    message: format!("{} unindexed trailing bytes", size - cursor),
                });
            }
        }

        Ok(report)
    }

    /// Runs a read, rebuilding the index and retrying once on corruption.
    fn read_with_rebuild<T>(&self, op: impl Fn(&Index) -> CoreResult<T>) -> CoreResult<T> {
        {
            let index = self.store.read();
            match op(&*index) {
                Err(e) if e.is_corruption() => {
                    warn!(logbook = %self.config.name, error = %e, "corrupt record, rebuilding index");
                }
                result => return result,
            }
        }

        let mut index = self.store.write();
        self.store.rebuild(&mut *index)?;
        op(&*index)
    }

    /// Runs a mutation under the write lock, rebuilding the index and
    /// retrying once on corruption.
    ///
    /// A mutation must detect corruption before it changes anything.
    fn write_with_rebuild<T>(&self, mut op: impl FnMut(&mut Index) -> CoreResult<T>) -> CoreResult<T> {
        let mut index = self.store.write();
        match op(&mut *index) {
            Err(e) if e.is_corruption() => {
                warn!(logbook = %self.config.name, error = %e, "corrupt record, rebuilding index");
                self.store.rebuild(&mut *index)?;
                op(&mut *index)
            }
            result => result,
        }
    }

    /// Reads the bytes the index holds for `id` and checks them against the
    /// stored digest.
    fn load_record(&self, index: &Index, id: MessageId) -> CoreResult<(IndexEntry, Vec<u8>)> {
        let entry = index.lookup(id)?.clone();
        let len = usize::try_from(entry.len)
            .map_err(|_| CoreError::corrupt_record(&entry.file, entry.offset, "record too large"))?;

        let bytes = match self.store.dir().read(&entry.file, entry.offset, len) {
            Ok(bytes) => bytes,
            Err(e) if e.is_missing_file() => {
                return Err(CoreError::corrupt_record(
                    &entry.file,
                    entry.offset,
                    "log file is missing",
                ));
            }
            Err(CoreError::Storage(elog_storage::StorageError::ReadPastEnd { .. })) => {
                return Err(CoreError::corrupt_record(
                    &entry.file,
                    entry.offset,
                    "offset past end of file",
                ));
            }
            Err(e) => return Err(e),
        };

        if bytes.len() != len || Digest::of(&bytes) != entry.digest {
            return Err(CoreError::corrupt_record(
                &entry.file,
                entry.offset,
                format!("record {id} changed on disk"),
            ));
        }
        Ok((entry, bytes))
    }
}

fn decode_record(entry: &IndexEntry, bytes: &[u8]) -> CoreResult<Entry> {
    decode_entry(bytes, Some(entry.id))
        .map_err(|e| CoreError::from_decode(e, &entry.file, entry.offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::MemoryAttachmentStore;
    use elog_codec::{encode_entry, Encoding};
    use std::fs;
    use tempfile::TempDir;

    fn date(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc2822(text).unwrap()
    }

    fn open(temp: &TempDir) -> Logbook {
        let config = LogbookConfig::new("demo", temp.path()).sync_writes(false);
        Logbook::open(config, &IndexRegistry::new()).unwrap()
    }

    /// Checks that every index entry points at exactly its record bytes.
    fn assert_consistent(book: &Logbook) {
        let report = book.verify().unwrap();
        assert!(report.is_clean(), "{:?}", report.problems);
    }

    #[test]
    fn hello_scenario() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);

        let id = book.submit(None, Draft::new().body("Hello")).unwrap();
        assert_eq!(id, 1);
        assert_eq!(book.retrieve(1).unwrap().body, "Hello");
        let before = book.digests()[&1];

        book.submit(Some(1), Draft::new().body("Hello2")).unwrap();
        assert_eq!(book.retrieve(1).unwrap().body, "Hello2");
        assert_ne!(book.digests()[&1], before);

        book.delete(1, DeleteOptions::default()).unwrap();
        assert!(matches!(book.retrieve(1), Err(CoreError::NotFound { id: 1 })));
    }

    #[test]
    fn edit_keeps_unchanged_fields() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");

        book.submit(
            None,
            Draft::new()
                .date(when)
                .attribute("Author", "jdoe")
                .encoding(Encoding::ELCode)
                .body("first"),
        )
        .unwrap();
        book.submit(Some(1), Draft::new().body("second")).unwrap();

        let entry = book.retrieve(1).unwrap();
        assert_eq!(entry.date, when);
        assert_eq!(entry.attribute("Author"), Some("jdoe"));
        assert_eq!(entry.encoding, Encoding::ELCode);
        assert_eq!(entry.body, "second");
    }

    #[test]
    fn digest_matches_bytes_on_disk_after_every_write() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");

        for i in 0..5 {
            book.submit(None, Draft::new().date(when).body(format!("entry {i}")))
                .unwrap();
        }
        book.submit(Some(2), Draft::new().body("a much longer body than before\nwith lines"))
            .unwrap();
        book.submit(Some(4), Draft::new().body("")).unwrap();
        book.delete(3, DeleteOptions::entry_only()).unwrap();

        for entry in book.index_entries() {
            let raw = book.raw_record(entry.id).unwrap();
            assert_eq!(Digest::of(&raw.bytes), entry.digest);
        }
        assert_consistent(&book);
        assert_eq!(book.ids(), [1, 2, 4, 5]);
    }

    #[test]
    fn ids_are_reused_after_deleting_the_highest() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        book.submit(None, Draft::new().body("a")).unwrap();
        book.submit(None, Draft::new().body("b")).unwrap();
        book.delete(2, DeleteOptions::default()).unwrap();
        assert_eq!(book.submit(None, Draft::new().body("c")).unwrap(), 2);

        assert_eq!(book.submit(Some(10), Draft::new().body("given")).unwrap(), 10);
        assert_eq!(book.max_id(), Some(10));
        assert!(book.submit(Some(0), Draft::new()).is_err());
    }

    #[test]
    fn delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        book.submit(None, Draft::new().body("a")).unwrap();
        book.submit(None, Draft::new().body("b")).unwrap();

        book.delete(1, DeleteOptions::default()).unwrap();
        let snapshot = book.index_entries();
        let file = &snapshot[0].file;
        let bytes = book.dir().read_all(file).unwrap();

        assert!(matches!(
            book.delete(1, DeleteOptions::default()),
            Err(CoreError::NotFound { id: 1 })
        ));
        assert_eq!(book.index_entries(), snapshot);
        assert_eq!(book.dir().read_all(file).unwrap(), bytes);
    }

    #[test]
    fn deleting_last_record_removes_file() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");
        book.submit(None, Draft::new().date(when).body("only")).unwrap();
        assert!(temp.path().join("240131a.log").exists());

        book.delete(1, DeleteOptions::default()).unwrap();
        assert!(!temp.path().join("240131a.log").exists());
        assert!(book.is_empty());
    }

    #[test]
    fn replies_link_and_cascade() {
        let temp = TempDir::new().unwrap();
        let attachments = Arc::new(MemoryAttachmentStore::new());
        let book = Logbook::open_with_attachments(
            LogbookConfig::new("demo", temp.path()).sync_writes(false),
            &IndexRegistry::new(),
            attachments.clone(),
        )
        .unwrap();
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");

        let root = book.submit(None, Draft::new().date(when).body("root")).unwrap();
        let name = book.store_attachment(&when, "plot.png", b"png").unwrap();
        let reply = book
            .submit(
                None,
                Draft::new()
                    .date(when)
                    .reply_to(root)
                    .attachments(vec![name.clone()])
                    .body("reply"),
            )
            .unwrap();
        let nested = book
            .submit(None, Draft::new().date(when).reply_to(reply).body("nested"))
            .unwrap();
        let other = book.submit(None, Draft::new().date(when).body("other")).unwrap();

        assert_eq!(book.retrieve(root).unwrap().reply_to, [reply]);
        assert_eq!(book.retrieve(reply).unwrap().in_reply_to, Some(root));
        assert_eq!(book.first(true), Some(root));
        assert_eq!(book.next(root, true), Some(other));

        let report = book.delete(reply, DeleteOptions::default()).unwrap();
        assert_eq!(report.deleted, [reply, nested]);
        assert_eq!(report.attachments_removed, [name]);
        assert!(report.is_complete());
        assert!(attachments.is_empty());
        assert!(book.retrieve(root).unwrap().reply_to.is_empty());
        assert_eq!(book.ids(), [root, other]);
        assert_consistent(&book);
    }

    #[test]
    fn reply_to_missing_parent_is_rejected() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        assert!(matches!(
            book.submit(None, Draft::new().reply_to(7)),
            Err(CoreError::NotFound { id: 7 })
        ));
        assert!(book.is_empty());
    }

    #[test]
    fn reply_to_externally_changed_parent_rebuilds_first() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");
        let root = book.submit(None, Draft::new().date(when).body("root")).unwrap();
        let other = book.submit(None, Draft::new().date(when).body("other")).unwrap();

        let edited = encode_entry(
            &elog_codec::Entry::new(root, when).with_body("root, edited elsewhere"),
            &AttributeSchema::permissive(),
        )
        .unwrap();
        let path = temp.path().join("240131a.log");
        fs::write(&path, [edited, book.raw_record(other).unwrap().bytes].concat()).unwrap();

        let reply = book
            .submit(None, Draft::new().date(when).reply_to(root).body("reply"))
            .unwrap();
        let parent = book.retrieve(root).unwrap();
        assert_eq!(parent.body, "root, edited elsewhere");
        assert_eq!(parent.reply_to, [reply]);
        assert_eq!(book.retrieve(reply).unwrap().in_reply_to, Some(root));
        assert_consistent(&book);
    }

    #[test]
    fn move_with_externally_changed_reply_rebuilds_first() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");
        book.submit(None, Draft::new().date(when).body("root")).unwrap();
        book.submit(None, Draft::new().date(when).reply_to(1).body("mid")).unwrap();
        book.submit(None, Draft::new().date(when).reply_to(2).body("leaf")).unwrap();

        let leaf = encode_entry(
            &elog_codec::Entry::new(3, when)
                .in_reply_to(2)
                .with_body("leaf, edited elsewhere"),
            &AttributeSchema::permissive(),
        )
        .unwrap();
        let head = [book.raw_record(1).unwrap().bytes, book.raw_record(2).unwrap().bytes];
        fs::write(temp.path().join("240131a.log"), [head.concat(), leaf].concat()).unwrap();

        book.move_entry(2, 20).unwrap();
        let leaf = book.retrieve(3).unwrap();
        assert_eq!(leaf.body, "leaf, edited elsewhere");
        assert_eq!(leaf.in_reply_to, Some(20));
        assert_eq!(book.retrieve(1).unwrap().reply_to, [20]);
        assert_eq!(book.retrieve(20).unwrap().reply_to, [3]);
        assert_consistent(&book);
    }

    #[test]
    fn date_change_moves_record_between_files() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let jan = date("Wed, 31 Jan 2024 14:05:00 +0100");
        let feb = date("Thu, 01 Feb 2024 08:00:00 +0100");

        book.submit(None, Draft::new().date(jan).body("a")).unwrap();
        book.submit(None, Draft::new().date(jan).body("b")).unwrap();
        book.submit(Some(1), Draft::new().date(feb)).unwrap();

        assert_eq!(book.index_entry(1).unwrap().file, "240201a.log");
        assert_eq!(book.index_entry(2).unwrap().offset, 0);
        assert_eq!(book.ids(), [2, 1]);
        assert_eq!(book.retrieve(1).unwrap().body, "a");
        assert_consistent(&book);
    }

    #[test]
    fn edit_out_of_order_resorts() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let morning = date("Wed, 31 Jan 2024 08:00:00 +0100");
        let noon = date("Wed, 31 Jan 2024 12:00:00 +0100");
        let evening = date("Wed, 31 Jan 2024 20:00:00 +0100");

        book.submit(None, Draft::new().date(morning)).unwrap();
        book.submit(None, Draft::new().date(noon)).unwrap();
        assert_eq!(book.ids(), [1, 2]);

        book.submit(Some(1), Draft::new().date(evening)).unwrap();
        assert_eq!(book.ids(), [2, 1]);
        assert_eq!(book.last(false), Some(1));
        assert_consistent(&book);
    }

    #[test]
    fn optimistic_lock_check() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        book.submit(None, Draft::new().body("a")).unwrap();
        let digest = book.digests()[&1];

        book.lock(1, Some("alice@host")).unwrap();
        assert_eq!(book.retrieve(1).unwrap().locked_by.as_deref(), Some("alice@host"));
        assert_eq!(book.retrieve(1).unwrap().body, "a");

        let err = book
            .submit(Some(1), Draft::new().body("b").expect_lock(None))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { id: 1, .. }));

        book.submit(
            Some(1),
            Draft::new()
                .body("b")
                .expect_lock(Some("alice@host".into()))
                .release_lock(),
        )
        .unwrap();
        let entry = book.retrieve(1).unwrap();
        assert_eq!(entry.body, "b");
        assert!(entry.locked_by.is_none());

        book.lock(1, None).unwrap();
        assert_ne!(book.digests()[&1], digest);
        assert!(matches!(book.lock(9, None), Err(CoreError::NotFound { id: 9 })));
    }

    #[test]
    fn move_entry_rewrites_links() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");

        book.submit(None, Draft::new().date(when).body("root")).unwrap();
        book.submit(None, Draft::new().date(when).reply_to(1).body("mid")).unwrap();
        book.submit(None, Draft::new().date(when).reply_to(2).body("leaf")).unwrap();

        assert!(matches!(book.move_entry(2, 3), Err(CoreError::IdInUse { id: 3 })));
        book.move_entry(2, 20).unwrap();

        assert!(!book.contains(2));
        let moved = book.retrieve(20).unwrap();
        assert_eq!(moved.body, "mid");
        assert_eq!(moved.in_reply_to, Some(1));
        assert_eq!(moved.reply_to, [3]);
        assert_eq!(book.retrieve(1).unwrap().reply_to, [20]);
        assert_eq!(book.retrieve(3).unwrap().in_reply_to, Some(20));
        assert_consistent(&book);
    }

    #[test]
    fn store_record_keeps_bytes_verbatim() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let entry = elog_codec::Entry::new(5, date("Wed, 31 Jan 2024 14:05:00 +0100"))
            .with_attribute("Unknown", "kept")
            .with_body("pulled");
        let bytes = encode_entry(&entry, &AttributeSchema::permissive()).unwrap();

        assert_eq!(book.store_record(&bytes).unwrap(), 5);
        assert_eq!(book.raw_record(5).unwrap().bytes, bytes);
        assert_eq!(book.digests()[&5], Digest::of(&bytes));

        let newer = encode_entry(&entry.with_body("pulled again"), &AttributeSchema::permissive())
            .unwrap();
        book.store_record(&newer).unwrap();
        assert_eq!(book.raw_record(5).unwrap().bytes, newer);
        assert_eq!(book.len(), 1);

        assert!(book.store_record(b"not a record\n").is_err());
        assert!(book.store_record(&[bytes.clone(), bytes.clone()].concat()).is_err());
        assert!(book.store_record(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn schema_applies_to_new_attributes() {
        let temp = TempDir::new().unwrap();
        let schema = AttributeSchema::new(["Author", "Subject"]).unwrap();
        let config = LogbookConfig::new("strict", temp.path())
            .schema(schema)
            .sync_writes(false);
        let book = Logbook::open(config, &IndexRegistry::new()).unwrap();

        book.submit(
            None,
            Draft::new().attribute("Subject", "s").attribute("Author", "a"),
        )
        .unwrap();
        let names: Vec<_> = book
            .retrieve(1)
            .unwrap()
            .attributes
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["Author", "Subject"]);

        assert!(matches!(
            book.submit(None, Draft::new().attribute("Color", "red")),
            Err(CoreError::Codec(_))
        ));
    }

    #[test]
    fn logbooks_on_one_directory_share_the_index() {
        let temp = TempDir::new().unwrap();
        let registry = IndexRegistry::new();
        let a = Logbook::open(LogbookConfig::new("a", temp.path()), &registry).unwrap();
        let b = Logbook::open(LogbookConfig::new("b", temp.path()), &registry).unwrap();
        assert!(a.shares_index_with(&b));

        let id = a.submit(None, Draft::new().body("from a")).unwrap();
        assert_eq!(b.retrieve(id).unwrap().body, "from a");
        b.delete(id, DeleteOptions::default()).unwrap();
        assert!(!a.contains(id));
    }

    #[test]
    fn external_modification_triggers_rebuild() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");
        book.submit(None, Draft::new().date(when).body("one")).unwrap();
        book.submit(None, Draft::new().date(when).body("two")).unwrap();

        // Another process rewrites the file with a longer first record.
        let path = temp.path().join("240131a.log");
        let first = encode_entry(
            &elog_codec::Entry::new(1, when).with_body("one, but edited elsewhere"),
            &AttributeSchema::permissive(),
        )
        .unwrap();
        let second = book.raw_record(2).unwrap().bytes;
        fs::write(&path, [first, second].concat()).unwrap();

        assert_eq!(book.retrieve(2).unwrap().body, "two");
        assert_eq!(book.retrieve(1).unwrap().body, "one, but edited elsewhere");
        assert_consistent(&book);

        // The next mutation works on the rebuilt index too.
        fs::write(&path, book.raw_record(2).unwrap().bytes).unwrap();
        book.delete(2, DeleteOptions::default()).unwrap();
        assert!(matches!(book.retrieve(1), Err(CoreError::NotFound { id: 1 })));
        assert!(book.is_empty());
    }

    #[test]
    fn verify_reports_unindexed_bytes() {
        let temp = TempDir::new().unwrap();
        let book = open(&temp);
        let when = date("Wed, 31 Jan 2024 14:05:00 +0100");
        book.submit(None, Draft::new().date(when).body("one")).unwrap();

        let path = temp.path().join("240131a.log");
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(b"$@MID@$: 2\nbroken\n");
        fs::write(&path, bytes).unwrap();
        book.rebuild_index().unwrap();

        let report = book.verify().unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.problems.len(), 1);
        assert_eq!(report.problems[0].id, None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create { hour: u32, body: String },
        Edit { pick: usize, hour: Option<u32>, body: String },
        Delete { pick: usize },
    }

    fn op_strategy() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::*;
        prop_oneof![
            (0u32..48, "[a-z \n]{0,40}").prop_map(|(hour, body)| Op::Create { hour, body }),
            (any::<usize>(), proptest::option::of(0u32..48), "[a-z \n]{0,80}")
                .prop_map(|(pick, hour, body)| Op::Edit { pick, hour, body }),
            any::<usize>().prop_map(|pick| Op::Delete { pick }),
        ]
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

        #[test]
        fn random_operations_keep_offsets_consistent(ops in proptest::collection::vec(op_strategy(), 1..25)) {
            let temp = TempDir::new().unwrap();
            let book = open(&temp);
            let base = date("Wed, 31 Jan 2024 00:00:00 +0000");
            let at = |hour: u32| base + chrono::Duration::hours(i64::from(hour));

            for op in ops {
                let ids = book.ids();
                match op {
                    Op::Create { hour, body } => {
                        book.submit(None, Draft::new().date(at(hour)).body(body)).unwrap();
                    }
                    Op::Edit { pick, hour, body } if !ids.is_empty() => {
                        let mut draft = Draft::new().body(body);
                        draft.date = hour.map(at);
                        book.submit(Some(ids[pick % ids.len()]), draft).unwrap();
                    }
                    Op::Delete { pick } if !ids.is_empty() => {
                        book.delete(ids[pick % ids.len()], DeleteOptions::default()).unwrap();
                    }
                    _ => {}
                }
                let report = book.verify().unwrap();
                proptest::prop_assert!(report.is_clean(), "{:?}", report.problems);
            }

            let times: Vec<i64> = book.index_entries().iter().map(|e| e.time).collect();
            proptest::prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
