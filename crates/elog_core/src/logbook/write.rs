//! Creating, editing and storing records.

use super::{decode_record, Draft, Logbook};
use crate::error::{CoreError, CoreResult};
use crate::index::{Index, IndexEntry};
use crate::logdir::LogDir;
use chrono::{DateTime, FixedOffset, Local};
use elog_codec::{
    decode_entry, encode_entry, record_len, truncate_to_seconds, AttributeSchema, Digest, Entry,
    MessageId,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

fn now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

fn next_id(index: &Index) -> CoreResult<MessageId> {
    match index.max_id() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_operation("entry ids exhausted")),
    }
}

impl Logbook {
    /// Creates or edits an entry.
    ///
    /// With `id == None`, or an id that doesn't exist yet, a new entry is
    /// created: it gets `max + 1` (or the given id), is appended to the file
    /// for its date, and its parent's reply list gains it. Otherwise the
    /// existing entry is edited: fields left `None` in the draft keep their
    /// stored values, and the record is spliced in place (or moved to
    /// another file if its date changed).
    ///
    /// Returns the entry id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Conflict`] if `draft.expected_lock` doesn't match the
    ///   stored lock owner
    /// - [`CoreError::NotFound`] if the parent of a new reply doesn't exist
    /// - [`CoreError::Codec`] if the entry cannot be encoded
    /// - I/O errors
    pub fn submit(&self, id: Option<MessageId>, draft: Draft) -> CoreResult<MessageId> {
        if id == Some(0) {
            return Err(CoreError::invalid_operation("entry id 0 is reserved"));
        }
        self.write_with_rebuild(|index| match id {
            Some(id) if index.contains(id) => self.edit_locked(index, id, &draft),
            _ => self.create_locked(index, id, &draft),
        })
    }

    /// Writes a raw record verbatim, replacing any entry with the same id.
    ///
    /// Used for records pulled from a mirror peer: the stored bytes, and so
    /// the digest, are exactly the peer's. A stored reply whose parent exists
    /// locally is added to the parent's reply list if missing there.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if `bytes` is not exactly one decodable
    /// record, [`CoreError::InvalidOperation`] if it doesn't end with a
    /// newline, or an I/O error.
    pub fn store_record(&self, bytes: &[u8]) -> CoreResult<MessageId> {
        let entry = decode_entry(bytes, None)?;
        if record_len(bytes) != bytes.len() {
            return Err(CoreError::invalid_operation(format!(
                "record {} is followed by another record",
                entry.id
            )));
        }
        if !bytes.ends_with(b"\n") {
            return Err(CoreError::invalid_operation(format!(
                "record {} does not end with a newline",
                entry.id
            )));
        }
        if entry.id == 0 {
            return Err(CoreError::invalid_operation("entry id 0 is reserved"));
        }

        self.write_with_rebuild(|index| {
            let parent = entry
                .in_reply_to
                .filter(|&parent| parent != entry.id && index.contains(parent));
            if let Some(parent) = parent {
                self.check_record(index, parent)?;
            }

            if index.contains(entry.id) {
                let (old, old_bytes) = self.load_record(index, entry.id)?;
                if old_bytes != bytes {
                    self.replace_locked(index, &old, &entry, bytes)?;
                }
            } else {
                self.append_locked(index, &entry, bytes)?;
            }

            // The record itself stays verbatim; only the local parent learns
            // about a reply it doesn't list yet.
            if let Some(parent) = parent {
                let linked = self.rewrite_locked(index, parent, |p| {
                    if !p.reply_to.contains(&entry.id) {
                        p.reply_to.push(entry.id);
                    }
                })?;
                if linked {
                    debug!(logbook = %self.name(), id = entry.id, parent, "linked stored reply");
                }
            }
            debug!(logbook = %self.name(), id = entry.id, "stored raw record");
            Ok(entry.id)
        })
    }

    /// Sets or clears the advisory lock owner of an entry.
    ///
    /// Only the lock field changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the entry doesn't exist, or
    /// [`CoreError::Codec`] if the owner is not a valid header value.
    pub fn lock(&self, id: MessageId, owner: Option<&str>) -> CoreResult<()> {
        self.write_with_rebuild(|index| {
            self.rewrite_locked(index, id, |entry| {
                entry.locked_by = owner.map(str::to_string);
            })
        })?;
        Ok(())
    }

    /// Renumbers an entry.
    ///
    /// The record is copied under `new`, its parent's reply list and its
    /// replies' parent pointers are rewritten, and `old` is deleted without
    /// cascading.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdInUse`] if `new` exists, [`CoreError::NotFound`]
    /// if `old` doesn't, or an I/O error.
    pub fn move_entry(&self, old: MessageId, new: MessageId) -> CoreResult<()> {
        if new == 0 {
            return Err(CoreError::invalid_operation("entry id 0 is reserved"));
        }
        if old == new {
            return Ok(());
        }
        self.write_with_rebuild(|index| self.move_locked(index, old, new))
    }

    fn create_locked(
        &self,
        index: &mut Index,
        id: Option<MessageId>,
        draft: &Draft,
    ) -> CoreResult<MessageId> {
        let id = match id {
            Some(id) => id,
            None => next_id(index)?,
        };
        if let Some(parent) = draft.in_reply_to {
            self.check_record(index, parent)?;
        }

        let mut entry = Entry::new(id, draft.date.unwrap_or_else(now));
        entry.attributes = self
            .schema()
            .arrange(draft.attributes.clone().unwrap_or_default())?;
        entry.body = draft.body.clone().unwrap_or_default();
        entry.encoding = draft.encoding.unwrap_or_default();
        entry.attachments = draft.attachments.clone().unwrap_or_default();
        entry.in_reply_to = draft.in_reply_to;
        entry.locked_by = draft.locked_by.clone().flatten();

        let bytes = encode_entry(&entry, self.schema())?;
        self.append_locked(index, &entry, &bytes)?;
        info!(logbook = %self.name(), id, "created entry");

        if let Some(parent) = entry.in_reply_to {
            self.rewrite_locked(index, parent, |p| {
                if !p.reply_to.contains(&id) {
                    p.reply_to.push(id);
                }
            })?;
        }
        Ok(id)
    }

    fn edit_locked(&self, index: &mut Index, id: MessageId, draft: &Draft) -> CoreResult<MessageId> {
        let (old, bytes) = self.load_record(index, id)?;
        let mut entry = decode_record(&old, &bytes)?;

        if let Some(expected) = &draft.expected_lock {
            if *expected != entry.locked_by {
                return Err(CoreError::Conflict {
                    id,
                    expected: expected.clone(),
                    actual: entry.locked_by,
                });
            }
        }

        // Historical entries may predate the current schema; only new
        // attribute values are held to it.
        let permissive = AttributeSchema::permissive();
        let schema = match &draft.attributes {
            Some(attributes) => {
                entry.attributes = self.schema().arrange(attributes.clone())?;
                self.schema()
            }
            None => &permissive,
        };
        if let Some(date) = draft.date {
            entry.date = truncate_to_seconds(date);
        }
        if let Some(body) = &draft.body {
            entry.body.clone_from(body);
        }
        if let Some(encoding) = draft.encoding {
            entry.encoding = encoding;
        }
        if let Some(attachments) = &draft.attachments {
            entry.attachments.clone_from(attachments);
        }
        if let Some(owner) = &draft.locked_by {
            entry.locked_by.clone_from(owner);
        }

        let new_bytes = encode_entry(&entry, schema)?;
        if new_bytes != bytes {
            self.replace_locked(index, &old, &entry, &new_bytes)?;
            info!(logbook = %self.name(), id, "edited entry");
        }
        Ok(id)
    }

    fn move_locked(&self, index: &mut Index, old: MessageId, new: MessageId) -> CoreResult<()> {
        if index.contains(new) {
            return Err(CoreError::IdInUse { id: new });
        }
        let (location, bytes) = self.load_record(index, old)?;
        let mut entry = decode_record(&location, &bytes)?;

        let mut children: BTreeSet<MessageId> = entry.reply_to.iter().copied().collect();
        children.extend(index.iter().filter(|e| e.parent == Some(old)).map(|e| e.id));
        children.retain(|&child| child != old && index.contains(child));
        let parent = entry
            .in_reply_to
            .filter(|&parent| parent != old && index.contains(parent));

        // Every record relinked below must be readable before anything is written.
        if let Some(parent) = parent {
            self.check_record(index, parent)?;
        }
        for &child in &children {
            self.check_record(index, child)?;
        }

        entry.id = new;
        let new_bytes = encode_entry(&entry, &AttributeSchema::permissive())?;
        self.append_locked(index, &entry, &new_bytes)?;
        self.delete_one_locked(index, old)?;

        if let Some(parent) = parent {
            self.rewrite_locked(index, parent, |p| {
                for reply in &mut p.reply_to {
                    if *reply == old {
                        *reply = new;
                    }
                }
            })?;
        }
        for child in children {
            self.rewrite_locked(index, child, |c| {
                if c.in_reply_to == Some(old) {
                    c.in_reply_to = Some(new);
                }
            })?;
        }

        info!(logbook = %self.name(), old, new, "moved entry");
        Ok(())
    }

    /// Loads and decodes `id` without changing anything.
    fn check_record(&self, index: &Index, id: MessageId) -> CoreResult<()> {
        let (location, bytes) = self.load_record(index, id)?;
        decode_record(&location, &bytes)?;
        Ok(())
    }

    /// Decodes `id`, applies `change` and writes the result back if the
    /// encoding changed. Returns true if the record was rewritten.
    pub(super) fn rewrite_locked(
        &self,
        index: &mut Index,
        id: MessageId,
        change: impl FnOnce(&mut Entry),
    ) -> CoreResult<bool> {
        let (location, bytes) = self.load_record(index, id)?;
        let mut entry = decode_record(&location, &bytes)?;
        change(&mut entry);

        let new_bytes = encode_entry(&entry, &AttributeSchema::permissive())?;
        if new_bytes == bytes {
            return Ok(false);
        }
        self.replace_locked(index, &location, &entry, &new_bytes)?;
        Ok(true)
    }

    /// Appends a record to the file for its date and indexes it.
    pub(super) fn append_locked(&self, index: &mut Index, entry: &Entry, bytes: &[u8]) -> CoreResult<()> {
        let file = LogDir::file_name_for(&entry.date);
        let offset = self.dir().append(&file, bytes)?;
        index.insert(IndexEntry {
            id: entry.id,
            file,
            time: entry.date.timestamp(),
            offset,
            len: bytes.len() as u64,
            parent: entry.in_reply_to,
            digest: Digest::of(bytes),
        });
        Ok(())
    }

    /// Replaces the record at `old` with `bytes`, which encode `entry`.
    ///
    /// Within one file this is a splice followed by an offset shift. When
    /// the date moved the entry to another file, the new record is appended
    /// there first and the old one is spliced out afterwards.
    pub(super) fn replace_locked(
        &self,
        index: &mut Index,
        old: &IndexEntry,
        entry: &Entry,
        bytes: &[u8],
    ) -> CoreResult<()> {
        let dir = self.dir();
        let file = LogDir::file_name_for(&entry.date);
        let digest = Digest::of(bytes);
        let len = bytes.len() as u64;

        if file == old.file {
            let outcome = dir.splice(&old.file, old.range(), bytes)?;
            index.shift_offsets(&old.file, old.offset + old.len, outcome.delta);
            index.update_location(old.id, len, digest, entry.date.timestamp(), entry.in_reply_to)?;
            return Ok(());
        }

        let offset = dir.append(&file, bytes)?;
        let outcome = dir.splice(&old.file, old.range(), &[])?;
        index.remove(old.id);
        index.shift_offsets(&old.file, old.offset + old.len, outcome.delta);
        if outcome.new_size == 0 {
            self.remove_empty_file(&old.file);
        }
        index.insert(IndexEntry {
            id: entry.id,
            file,
            time: entry.date.timestamp(),
            offset,
            len,
            parent: entry.in_reply_to,
            digest,
        });
        debug!(logbook = %self.name(), id = entry.id, from = %old.file, "moved record to another file");
        Ok(())
    }

    pub(super) fn remove_empty_file(&self, file: &str) {
        if let Err(e) = self.dir().remove_if_empty(file) {
            warn!(logbook = %self.name(), file, error = %e, "could not remove empty log file");
        }
    }
}
