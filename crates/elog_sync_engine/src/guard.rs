//! Process-wide serialisation of passes per (logbook, peer).

use crate::error::{SyncError, SyncResult};
use parking_lot::{const_mutex, Mutex};
use std::collections::BTreeSet;

static RUNNING: Mutex<BTreeSet<(String, String)>> = const_mutex(BTreeSet::new());

/// Marks a pass as running until dropped.
#[derive(Debug)]
pub(crate) struct PassGuard {
    key: (String, String),
}

impl PassGuard {
    /// Claims the (logbook, peer) key, failing fast if another pass holds
    /// it.
    pub(crate) fn acquire(logbook: &str, peer: &str) -> SyncResult<Self> {
        let key = (logbook.to_string(), peer.to_string());
        if !RUNNING.lock().insert(key.clone()) {
            return Err(SyncError::PassInProgress {
                logbook: key.0,
                peer: key.1,
            });
        }
        Ok(Self { key })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        RUNNING.lock().remove(&self.key);
    }
}
