//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};
use std::ops::Range;

/// What a [`StorageBackend::splice`] did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceOutcome {
    /// Signed change in length: `new_bytes.len() - range.len()`.
    ///
    /// Every byte that lived at or after `range.end` now lives `delta`
    /// bytes further along.
    pub delta: i64,
    /// Size of the store after the splice.
    pub new_size: u64,
}

/// A low-level storage backend for elog log files.
///
/// Storage backends are **opaque byte stores**. They provide simple operations
/// for reading, appending, overwriting and splicing data. elog owns all record
/// format interpretation - backends do not understand markers or entries.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `write_at` never leaves a hole: `offset` must not exceed `size()`
/// - `splice` writes the shifted tail durably before truncating
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The offset is beyond the current size
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Overwrites bytes starting at `offset`, growing the store if the write
    /// runs past the current end.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRange`] if `offset` is beyond the
    /// current size, or an I/O error.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Flushes all pending writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - it ensures that
    /// file metadata (size, timestamps) is also durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Replaces the bytes in `range` with `data`, shifting everything after
    /// the range.
    ///
    /// The order of operations matters for crash safety:
    /// 1. the tail `[range.end, size)` is read into memory,
    /// 2. `data` is written at `range.start`,
    /// 3. the tail is written right after `data`,
    /// 4. the store is synced,
    /// 5. only then is the store truncated to its new length.
    ///
    /// A crash between 4 and 5 leaves stale bytes past the real end, never
    /// a lost tail.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRange`] if the range is reversed or
    /// extends past the end, or an I/O error from any step.
    fn splice(&mut self, range: Range<u64>, data: &[u8]) -> StorageResult<SpliceOutcome> {
        let size = self.size()?;
        if range.start > range.end || range.end > size {
            return Err(StorageError::InvalidRange {
                start: range.start,
                end: range.end,
                size,
            });
        }

        let old_len = range.end - range.start;
        let delta = data.len() as i64 - old_len as i64;

        if delta == 0 {
            self.write_at(range.start, data)?;
            self.sync()?;
            return Ok(SpliceOutcome {
                delta,
                new_size: size,
            });
        }

        let tail = self.read_at(range.end, (size - range.end) as usize)?;
        self.write_at(range.start, data)?;
        let tail_start = range.start + data.len() as u64;
        self.write_at(tail_start, &tail)?;
        self.sync()?;

        let new_size = tail_start + tail.len() as u64;
        if new_size < self.size()? {
            self.truncate(new_size)?;
        }

        Ok(SpliceOutcome { delta, new_size })
    }
}
