//! Transport layer abstraction for mirror passes.

use crate::error::{SyncError, SyncResult};
use elog_codec::{Digest, MessageId};
use elog_sync_protocol::{DigestList, EntryTransfer};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A mirror transport talks to the peer holding the other copy of a
/// logbook.
///
/// Every call addresses one logbook by name. Implementations must bound
/// each call with a timeout and report it as [`SyncError::Timeout`].
pub trait MirrorTransport: Send + Sync {
    /// Fetches the peer's digest list.
    fn fetch_digests(&self, logbook: &str) -> SyncResult<DigestList>;

    /// Stores an entry on the peer, replacing any entry with the same id.
    fn push_entry(&self, logbook: &str, entry: &EntryTransfer) -> SyncResult<()>;

    /// Fetches one entry with its attachments.
    fn pull_entry(&self, logbook: &str, id: MessageId) -> SyncResult<EntryTransfer>;

    /// Deletes one entry on the peer.
    fn delete_entry(&self, logbook: &str, id: MessageId) -> SyncResult<()>;

    /// Returns where an operator can look at the peer's copy of an entry.
    fn location(&self, logbook: &str, id: MessageId) -> String;
}

/// An in-memory peer for testing.
///
/// Holds one logbook's worth of transfers and can be told to fail or time
/// out for chosen ids.
#[derive(Debug, Default)]
pub struct MockTransport {
    entries: Mutex<BTreeMap<MessageId, EntryTransfer>>,
    failing: Mutex<HashSet<MessageId>>,
    timing_out: Mutex<HashSet<MessageId>>,
    unreachable: AtomicBool,
    requests: AtomicUsize,
}

impl MockTransport {
    /// Creates an empty peer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry on the peer directly.
    pub fn insert(&self, entry: EntryTransfer) {
        self.entries.lock().insert(entry.id, entry);
    }

    /// Removes an entry from the peer directly.
    pub fn remove(&self, id: MessageId) -> Option<EntryTransfer> {
        self.entries.lock().remove(&id)
    }

    /// Returns the peer's copy of an entry.
    pub fn get(&self, id: MessageId) -> Option<EntryTransfer> {
        self.entries.lock().get(&id).cloned()
    }

    /// Returns the peer's ids.
    pub fn ids(&self) -> Vec<MessageId> {
        self.entries.lock().keys().copied().collect()
    }

    /// Makes every transfer of `id` fail.
    pub fn fail_on(&self, id: MessageId) {
        self.failing.lock().insert(id);
    }

    /// Makes every transfer of `id` time out.
    pub fn time_out_on(&self, id: MessageId) {
        self.timing_out.lock().insert(id);
    }

    /// Clears injected failures and timeouts.
    pub fn heal(&self) {
        self.failing.lock().clear();
        self.timing_out.lock().clear();
        self.unreachable.store(false, Ordering::SeqCst);
    }

    /// Makes the digest list unavailable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Returns the number of requests served, digest lists included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn check(&self, id: MessageId) -> SyncResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.timing_out.lock().contains(&id) {
            return Err(SyncError::Timeout);
        }
        if self.failing.lock().contains(&id) {
            return Err(SyncError::transport_retryable(format!(
                "injected failure for entry {id}"
            )));
        }
        Ok(())
    }
}

impl MirrorTransport for MockTransport {
    fn fetch_digests(&self, _logbook: &str) -> SyncResult<DigestList> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("peer unreachable"));
        }
        let digests = self
            .entries
            .lock()
            .iter()
            .map(|(&id, entry)| (id, Digest::of(&entry.record)))
            .collect();
        Ok(DigestList::new("mock", digests))
    }

    fn push_entry(&self, _logbook: &str, entry: &EntryTransfer) -> SyncResult<()> {
        self.check(entry.id)?;
        self.insert(entry.clone());
        Ok(())
    }

    fn pull_entry(&self, _logbook: &str, id: MessageId) -> SyncResult<EntryTransfer> {
        self.check(id)?;
        self.get(id).ok_or_else(|| SyncError::Remote {
            status: 404,
            message: format!("entry {id} not found"),
        })
    }

    fn delete_entry(&self, _logbook: &str, id: MessageId) -> SyncResult<()> {
        self.check(id)?;
        self.remove(id);
        Ok(())
    }

    fn location(&self, logbook: &str, id: MessageId) -> String {
        format!("mock://{logbook}/{id}")
    }
}
