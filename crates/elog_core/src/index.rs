//! In-memory entry index.
//!
//! One [`IndexEntry`] per stored record, kept in time order. The index is
//! rebuilt from the log files on open and after corruption; in between it is
//! maintained in place by the entry engine.

use crate::error::{CoreError, CoreResult};
use crate::logdir::LogDir;
use elog_codec::{decode_entry, record_ranges, Digest, MessageId, MARKER};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use tracing::{info, warn};

/// Location and digest of one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// Entry id.
    pub id: MessageId,
    /// Log file name, relative to the data directory.
    pub file: String,
    /// Entry date as a Unix timestamp.
    pub time: i64,
    /// Byte offset of the record's marker.
    pub offset: u64,
    /// Record length in bytes.
    pub len: u64,
    /// Parent id, if this entry is a reply.
    pub parent: Option<MessageId>,
    /// Digest of the record's exact bytes.
    pub digest: Digest,
}

impl IndexEntry {
    /// Returns the record's byte range within its file.
    #[must_use]
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.len
    }

    /// Returns true if the entry starts a thread.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.parent.is_none()
    }
}

/// Time-ordered index of every record in a data directory.
///
/// Ties in time keep scan order (file name, then offset). When two records
/// carry the same id, lookups resolve to the later one in index order.
#[derive(Debug, Default, Clone)]
pub struct Index {
    entries: Vec<IndexEntry>,
    positions: HashMap<MessageId, usize>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index by scanning every log file in `dir`.
    ///
    /// Records that fail to decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LegacyFormat`] if a non-empty file yields no
    /// record and doesn't start with the marker, or an I/O error.
    pub fn build(dir: &LogDir) -> CoreResult<Self> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for file in dir.list_log_files()? {
            let buf = dir.read_all(&file)?;
            if buf.is_empty() {
                continue;
            }

            let mut decoded = 0usize;
            for range in record_ranges(&buf) {
                let bytes = &buf[range.clone()];
                match decode_entry(bytes, None) {
                    Ok(entry) => {
                        entries.push(IndexEntry {
                            id: entry.id,
                            file: file.clone(),
                            time: entry.date.timestamp(),
                            offset: range.start as u64,
                            len: bytes.len() as u64,
                            parent: entry.in_reply_to,
                            digest: Digest::of(bytes),
                        });
                        decoded += 1;
                    }
                    Err(e) => {
                        skipped += 1;
                        warn!(file = %file, offset = range.start, error = %e, "skipping undecodable record");
                    }
                }
            }

            if decoded == 0 && !buf.starts_with(MARKER.as_bytes()) {
                return Err(CoreError::LegacyFormat { file });
            }
        }

        // Stable: equal times keep scan order.
        entries.sort_by_key(|e| e.time);

        let mut index = Self {
            entries,
            positions: HashMap::new(),
        };
        index.reindex();

        if index.positions.len() != index.entries.len() {
            let mut seen = HashMap::new();
            for entry in &index.entries {
                if let Some(first) = seen.insert(entry.id, &entry.file) {
                    warn!(id = entry.id, first = %first, second = %entry.file, "duplicate entry id");
                }
            }
        }

        info!(
            dir = %dir.path().display(),
            entries = index.entries.len(),
            skipped,
            "index built"
        );
        Ok(index)
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (pos, entry) in self.entries.iter().enumerate() {
            self.positions.insert(entry.id, pos);
        }
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Returns the number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in time order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Looks up an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no entry has this id.
    pub fn lookup(&self, id: MessageId) -> CoreResult<&IndexEntry> {
        self.position(id)
            .map(|pos| &self.entries[pos])
            .ok_or(CoreError::NotFound { id })
    }

    /// Returns true if an entry with this id exists.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Returns the highest id, if any.
    #[must_use]
    pub fn max_id(&self) -> Option<MessageId> {
        self.positions.keys().copied().max()
    }

    /// Returns every id in time order.
    #[must_use]
    pub fn ids(&self) -> Vec<MessageId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Returns the digest of every entry, keyed by id.
    #[must_use]
    pub fn digests(&self) -> BTreeMap<MessageId, Digest> {
        self.positions
            .iter()
            .map(|(&id, &pos)| (id, self.entries[pos].digest))
            .collect()
    }

    /// Returns the entries stored in `file`, ordered by offset.
    #[must_use]
    pub fn file_entries(&self, file: &str) -> Vec<&IndexEntry> {
        let mut entries: Vec<_> = self.entries.iter().filter(|e| e.file == file).collect();
        entries.sort_by_key(|e| e.offset);
        entries
    }

    /// Returns the first entry in time order.
    #[must_use]
    pub fn first(&self, heads_only: bool) -> Option<MessageId> {
        self.entries
            .iter()
            .find(|e| !heads_only || e.is_head())
            .map(|e| e.id)
    }

    /// Returns the last entry in time order.
    #[must_use]
    pub fn last(&self, heads_only: bool) -> Option<MessageId> {
        self.entries
            .iter()
            .rev()
            .find(|e| !heads_only || e.is_head())
            .map(|e| e.id)
    }

    /// Returns the entry after `from` in time order.
    ///
    /// Returns `None` at the end or if `from` is unknown.
    #[must_use]
    pub fn next(&self, from: MessageId, heads_only: bool) -> Option<MessageId> {
        let pos = self.position(from)?;
        self.entries[pos + 1..]
            .iter()
            .find(|e| !heads_only || e.is_head())
            .map(|e| e.id)
    }

    /// Returns the entry before `from` in time order.
    ///
    /// Returns `None` at the start or if `from` is unknown.
    #[must_use]
    pub fn prev(&self, from: MessageId, heads_only: bool) -> Option<MessageId> {
        let pos = self.position(from)?;
        self.entries[..pos]
            .iter()
            .rev()
            .find(|e| !heads_only || e.is_head())
            .map(|e| e.id)
    }

    /// Shifts the offset of every entry in `file` at or after `from` by
    /// `delta` bytes.
    ///
    /// This is the only place offsets change after a splice.
    pub fn shift_offsets(&mut self, file: &str, from: u64, delta: i64) {
        if delta == 0 {
            return;
        }
        for entry in self.entries.iter_mut() {
            if entry.file == file && entry.offset >= from {
                entry.offset = entry.offset.saturating_add_signed(delta);
            }
        }
    }

    /// Inserts an entry after every entry with an earlier or equal time.
    pub fn insert(&mut self, entry: IndexEntry) {
        let pos = self.entries.partition_point(|e| e.time <= entry.time);
        self.entries.insert(pos, entry);
        self.reindex();
    }

    /// Removes an entry by id, returning it.
    pub fn remove(&mut self, id: MessageId) -> Option<IndexEntry> {
        let pos = self.position(id)?;
        let removed = self.entries.remove(pos);
        self.reindex();
        Some(removed)
    }

    /// Records a rewritten entry's new length, digest, time and parent.
    ///
    /// The entry stays in the same file at the same offset. If the new time
    /// breaks the order, the whole index is re-sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no entry has this id.
    pub fn update_location(
        &mut self,
        id: MessageId,
        len: u64,
        digest: Digest,
        time: i64,
        parent: Option<MessageId>,
    ) -> CoreResult<()> {
        let pos = self.position(id).ok_or(CoreError::NotFound { id })?;
        let entry = &mut self.entries[pos];
        entry.len = len;
        entry.digest = digest;
        entry.time = time;
        entry.parent = parent;

        let before_ok = pos == 0 || self.entries[pos - 1].time <= time;
        let after_ok = pos + 1 == self.entries.len() || time <= self.entries[pos + 1].time;
        if !(before_ok && after_ok) {
            self.resort();
        }
        Ok(())
    }

    /// Re-sorts the index by time, keeping the relative order of equal times.
    pub fn resort(&mut self) {
        self.entries.sort_by_key(|e| e.time);
        self.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use elog_codec::{encode_entry, AttributeSchema, Entry};
    use std::fs;
    use tempfile::TempDir;

    fn entry(id: MessageId, time: i64, parent: Option<MessageId>) -> IndexEntry {
        IndexEntry {
            id,
            file: "240131a.log".into(),
            time,
            offset: u64::from(id) * 100,
            len: 100,
            parent,
            digest: Digest::of(&id.to_le_bytes()),
        }
    }

    fn index_of(entries: Vec<IndexEntry>) -> Index {
        let mut index = Index::new();
        for e in entries {
            index.insert(e);
        }
        index
    }

    fn record(id: MessageId, date: &str, body: &str) -> Vec<u8> {
        let date = DateTime::parse_from_rfc2822(date).unwrap();
        encode_entry(
            &Entry::new(id, date).with_body(body),
            &AttributeSchema::permissive(),
        )
        .unwrap()
    }

    #[test]
    fn insert_keeps_time_order() {
        let index = index_of(vec![entry(1, 10, None), entry(2, 30, None), entry(3, 20, None)]);
        assert_eq!(index.ids(), [1, 3, 2]);

        // Equal times go after existing ones.
        let mut index = index;
        index.insert(entry(4, 20, None));
        assert_eq!(index.ids(), [1, 3, 4, 2]);
        assert_eq!(index.max_id(), Some(4));
    }

    #[test]
    fn navigation() {
        let index = index_of(vec![
            entry(1, 10, None),
            entry(2, 20, Some(1)),
            entry(3, 30, None),
            entry(4, 40, Some(3)),
        ]);

        assert_eq!(index.first(false), Some(1));
        assert_eq!(index.last(false), Some(4));
        assert_eq!(index.last(true), Some(3));
        assert_eq!(index.next(1, false), Some(2));
        assert_eq!(index.next(1, true), Some(3));
        assert_eq!(index.next(4, false), None);
        assert_eq!(index.prev(4, true), Some(3));
        assert_eq!(index.prev(3, true), Some(1));
        assert_eq!(index.prev(1, false), None);
        assert_eq!(index.next(99, false), None);
    }

    #[test]
    fn shift_only_touches_later_entries_of_one_file() {
        let mut a = entry(2, 20, None);
        a.file = "240201a.log".into();
        let mut index = index_of(vec![entry(1, 10, None), a, entry(3, 30, None)]);

        index.shift_offsets("240131a.log", 150, -40);

        assert_eq!(index.lookup(1).unwrap().offset, 100);
        assert_eq!(index.lookup(2).unwrap().offset, 200);
        assert_eq!(index.lookup(3).unwrap().offset, 260);
    }

    #[test]
    fn update_resorts_when_order_breaks() {
        let mut index = index_of(vec![entry(1, 10, None), entry(2, 20, None), entry(3, 30, None)]);
        let digest = Digest::of(b"new");

        index.update_location(2, 50, digest, 25, None).unwrap();
        assert_eq!(index.ids(), [1, 2, 3]);

        index.update_location(1, 50, digest, 40, Some(3)).unwrap();
        assert_eq!(index.ids(), [2, 3, 1]);
        assert_eq!(index.lookup(1).unwrap().digest, digest);
        assert_eq!(index.lookup(1).unwrap().parent, Some(3));
    }

    #[test]
    fn remove_and_lookup() {
        let mut index = index_of(vec![entry(1, 10, None), entry(2, 20, None)]);
        assert_eq!(index.remove(1).unwrap().id, 1);
        assert!(index.remove(1).is_none());
        assert!(matches!(index.lookup(1), Err(CoreError::NotFound { id: 1 })));
        assert_eq!(index.lookup(2).unwrap().id, 2);
        assert_eq!(index.digests().len(), 1);
    }

    #[test]
    fn build_scans_files() {
        let temp = TempDir::new().unwrap();
        let dir = LogDir::open(temp.path(), false, false).unwrap();

        let a = record(1, "Wed, 31 Jan 2024 14:05:00 +0100", "one");
        let b = record(2, "Wed, 31 Jan 2024 09:00:00 +0100", "two");
        let c = record(3, "Thu, 01 Feb 2024 08:00:00 +0100", "three");
        fs::write(temp.path().join("240131a.log"), [a.clone(), b.clone()].concat()).unwrap();
        fs::write(temp.path().join("240201a.log"), &c).unwrap();
        fs::write(temp.path().join("240202a.log"), b"").unwrap();

        let index = Index::build(&dir).unwrap();
        assert_eq!(index.ids(), [2, 1, 3]);

        let second = index.lookup(2).unwrap();
        assert_eq!(second.offset, a.len() as u64);
        assert_eq!(second.len, b.len() as u64);
        assert_eq!(second.digest, Digest::of(&b));
        assert_eq!(index.lookup(3).unwrap().file, "240201a.log");
    }

    #[test]
    fn build_skips_undecodable_records() {
        let temp = TempDir::new().unwrap();
        let dir = LogDir::open(temp.path(), false, false).unwrap();

        let good = record(1, "Wed, 31 Jan 2024 14:05:00 +0100", "one");
        let bad = b"$@MID@$: 2\nno separator here\n".to_vec();
        fs::write(temp.path().join("240131a.log"), [bad, good].concat()).unwrap();

        let index = Index::build(&dir).unwrap();
        assert_eq!(index.ids(), [1]);
    }

    #[test]
    fn build_rejects_legacy_files() {
        let temp = TempDir::new().unwrap();
        let dir = LogDir::open(temp.path(), false, false).unwrap();
        fs::write(temp.path().join("240131a.log"), b"Msg-ID: 1\nDate: whenever\n").unwrap();

        let err = Index::build(&dir).unwrap_err();
        assert!(matches!(err, CoreError::LegacyFormat { file } if file == "240131a.log"));
    }

    #[test]
    fn duplicate_ids_resolve_to_later_entry() {
        let temp = TempDir::new().unwrap();
        let dir = LogDir::open(temp.path(), false, false).unwrap();
        fs::write(
            temp.path().join("240131a.log"),
            record(7, "Wed, 31 Jan 2024 14:05:00 +0100", "old"),
        )
        .unwrap();
        fs::write(
            temp.path().join("240201a.log"),
            record(7, "Thu, 01 Feb 2024 08:00:00 +0100", "new"),
        )
        .unwrap();

        let index = Index::build(&dir).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(7).unwrap().file, "240201a.log");
    }
}
