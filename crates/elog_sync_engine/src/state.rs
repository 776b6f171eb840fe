//! Pass state, per-pass report and accumulated statistics.

use elog_codec::MessageId;
use elog_sync_protocol::Conflict;
use serde::Serialize;
use std::time::{Duration, Instant};

/// The current state of a sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass has run yet.
    Idle,
    /// Fetching the peer's digest list.
    FetchingDigests,
    /// Classifying ids and transferring entries.
    Reconciling,
    /// Writing the mirror cache.
    Persisting,
    /// The last pass completed.
    Synced,
    /// The last pass was aborted.
    Error,
}

impl SyncState {
    /// Returns true while a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::FetchingDigests | SyncState::Reconciling | SyncState::Persisting
        )
    }
}

/// Which copy an action changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// This logbook.
    Local,
    /// The peer's logbook.
    Remote,
}

/// What a pass was doing when a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Sending the local copy.
    Push,
    /// Fetching the remote copy.
    Pull,
    /// Moving a colliding local entry to a fresh id.
    Renumber,
    /// Deleting the local copy.
    DeleteLocal,
    /// Deleting the remote copy.
    DeleteRemote,
}

/// A transfer that failed. The id stays unresolved for the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    /// Entry id.
    pub id: MessageId,
    /// What was attempted.
    pub operation: Operation,
    /// Error message.
    pub reason: String,
}

/// A local entry moved away from a colliding id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Renumbered {
    /// Id shared with the peer's unrelated entry.
    pub from: MessageId,
    /// New local id.
    pub to: MessageId,
}

/// A deletion propagated from one side to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deletion {
    /// Entry id.
    pub id: MessageId,
    /// Side the entry was deleted on by this pass.
    pub side: Side,
}

/// Outcome of one mirror pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Logbook name.
    pub logbook: String,
    /// Server name from the peer's banner.
    pub peer: String,
    /// Ids already equal on both sides.
    pub converged: usize,
    /// Ids sent to the peer.
    pub pushed: Vec<MessageId>,
    /// Ids fetched from the peer.
    pub pulled: Vec<MessageId>,
    /// Local entries moved off colliding ids.
    pub renumbered: Vec<Renumbered>,
    /// Entries changed on both sides.
    pub conflicts: Vec<Conflict>,
    /// Deletions carried out.
    pub deletions: Vec<Deletion>,
    /// Deletions waiting for confirmation.
    pub pending_deletions: Vec<Deletion>,
    /// Transfers that failed.
    pub failures: Vec<TransferFailure>,
    /// Wall-clock duration of the pass.
    #[serde(skip)]
    pub duration: Duration,
}

impl SyncReport {
    pub(crate) fn new(logbook: impl Into<String>, peer: impl Into<String>) -> Self {
        Self {
            logbook: logbook.into(),
            peer: peer.into(),
            ..Self::default()
        }
    }

    /// Returns the number of actions that crossed the network: pushes,
    /// pulls and remote deletions.
    pub fn transfers(&self) -> usize {
        self.pushed.len()
            + self.pulled.len()
            + self
                .deletions
                .iter()
                .filter(|d| d.side == Side::Remote)
                .count()
    }

    /// Returns true if nothing is left for a later pass or an operator.
    pub fn is_settled(&self) -> bool {
        self.conflicts.is_empty() && self.pending_deletions.is_empty() && self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, id: MessageId, operation: Operation, reason: impl ToString) {
        self.failures.push(TransferFailure {
            id,
            operation,
            reason: reason.to_string(),
        });
    }
}

/// Statistics accumulated over the passes of one engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that completed.
    pub passes_completed: u64,
    /// Passes aborted before persisting the cache.
    pub passes_failed: u64,
    /// Entries pushed.
    pub entries_pushed: u64,
    /// Entries pulled.
    pub entries_pulled: u64,
    /// Conflicts reported, counted once per pass.
    pub conflicts_reported: u64,
    /// Failed transfers.
    pub transfer_failures: u64,
    /// Digest list fetch retries.
    pub retries: u64,
    /// End of the last completed pass.
    pub last_sync_time: Option<Instant>,
    /// Error of the last aborted pass.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record(&mut self, report: &SyncReport) {
        self.passes_completed += 1;
        self.entries_pushed += report.pushed.len() as u64;
        self.entries_pulled += report.pulled.len() as u64;
        self.conflicts_reported += report.conflicts.len() as u64;
        self.transfer_failures += report.failures.len() as u64;
        self.last_sync_time = Some(Instant::now());
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Reconciling.is_active());
        assert!(!SyncState::Synced.is_active());
    }

    #[test]
    fn transfers_skip_local_deletions() {
        let mut report = SyncReport::new("Linac", "peer");
        report.pushed.push(1);
        report.pulled.push(2);
        report.deletions.push(Deletion {
            id: 3,
            side: Side::Local,
        });
        report.deletions.push(Deletion {
            id: 4,
            side: Side::Remote,
        });
        assert_eq!(report.transfers(), 3);
        assert!(report.is_settled());

        report.fail(5, Operation::Pull, "timed out");
        assert!(!report.is_settled());
    }

    #[test]
    fn report_serializes_failures() {
        let mut report = SyncReport::new("Linac", "peer");
        report.fail(7, Operation::DeleteRemote, "status 500");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""operation":"delete_remote""#));
        assert!(!json.contains("duration"));
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = SyncStats::default();
        let mut report = SyncReport::new("Linac", "peer");
        report.pushed = vec![1, 2];
        stats.record(&report);
        stats.record(&report);
        assert_eq!(stats.passes_completed, 2);
        assert_eq!(stats.entries_pushed, 4);
        assert!(stats.last_sync_time.is_some());
    }
}
