//! The mirror pass.

use crate::config::{DeletionPolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::guard::PassGuard;
use crate::plan::{classify, Action};
use crate::state::{Deletion, Operation, Renumbered, Side, SyncReport, SyncState, SyncStats};
use crate::transport::MirrorTransport;
use elog_codec::{decode_entry, Digest, MessageId};
use elog_core::{CoreError, DeleteOptions, Logbook};
use elog_sync_protocol::{Conflict, DigestList, EntryTransfer, MirrorCache};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Options for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Carry out deletions held back by [`DeletionPolicy::Confirm`].
    pub confirm_deletions: bool,
}

impl PassOptions {
    /// Options for a pass that confirms pending deletions.
    #[must_use]
    pub fn confirmed() -> Self {
        Self {
            confirm_deletions: true,
        }
    }
}

/// Mirrors one local logbook with one peer.
///
/// A pass fetches the peer's digest list, classifies every id known to
/// either side or to the mirror cache, transfers what changed on one side
/// only, reports conflicts, and stores the new cache. A pass never
/// overlaps with another pass for the same logbook and peer, in this
/// engine or any other in the process.
pub struct SyncEngine<T: MirrorTransport> {
    config: SyncConfig,
    logbook: Logbook,
    transport: T,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<T: MirrorTransport> SyncEngine<T> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, logbook: Logbook, transport: T) -> Self {
        Self {
            config,
            logbook,
            transport,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local logbook.
    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the accumulated stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the mirror cache file of this logbook and peer.
    pub fn cache_path(&self) -> PathBuf {
        self.config.cache_path(self.logbook.dir().path())
    }

    /// Loads the mirror cache. A missing file is an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cache`] if the file cannot be read, or a
    /// protocol error if it is malformed.
    pub fn load_cache(&self) -> SyncResult<MirrorCache> {
        let path = self.cache_path();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(MirrorCache::parse(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MirrorCache::new()),
            Err(source) => Err(SyncError::Cache {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn save_cache(&self, cache: &MirrorCache) -> SyncResult<()> {
        let path = self.cache_path();
        let tmp = path.with_extension("mirror.tmp");
        fs::write(&tmp, cache.render())
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|source| SyncError::Cache {
                path: path.display().to_string(),
                source,
            })
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs one pass.
    ///
    /// Per-entry transfer failures, timeouts included, don't abort the
    /// pass; they are listed in the report and the ids stay unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PassInProgress`] if a pass for the same
    /// logbook and peer is running, or the error that stopped the digest
    /// list fetch or the cache load/save. Nothing local has changed when
    /// the digest list fetch fails.
    pub fn run_pass(&self, options: PassOptions) -> SyncResult<SyncReport> {
        let _guard = PassGuard::acquire(&self.config.logbook, &self.config.peer_key())?;
        let start = Instant::now();

        match self.pass(options) {
            Ok(mut report) => {
                report.duration = start.elapsed();
                self.set_state(SyncState::Synced);
                self.stats.write().record(&report);
                info!(
                    logbook = %self.config.logbook,
                    peer = %report.peer,
                    converged = report.converged,
                    pushed = report.pushed.len(),
                    pulled = report.pulled.len(),
                    conflicts = report.conflicts.len(),
                    failures = report.failures.len(),
                    "mirror pass complete"
                );
                Ok(report)
            }
            Err(err) => {
                self.set_state(SyncState::Error);
                {
                    let mut stats = self.stats.write();
                    stats.passes_failed += 1;
                    stats.last_error = Some(err.to_string());
                }
                warn!(logbook = %self.config.logbook, error = %err, "mirror pass aborted");
                Err(err)
            }
        }
    }

    fn pass(&self, options: PassOptions) -> SyncResult<SyncReport> {
        self.set_state(SyncState::FetchingDigests);
        let remote = self.fetch_with_retry()?;

        self.set_state(SyncState::Reconciling);
        let mut cache = self.load_cache()?;
        let mut report = SyncReport::new(&self.config.logbook, &remote.server);
        self.reconcile(&remote.digests, &mut cache, options, &mut report);

        self.set_state(SyncState::Persisting);
        self.save_cache(&cache)?;
        Ok(report)
    }

    fn fetch_with_retry(&self) -> SyncResult<DigestList> {
        let retry = &self.config.retry;
        let attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.transport.fetch_digests(&self.config.logbook) {
                Ok(list) => return Ok(list),
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    attempt += 1;
                    self.stats.write().retries += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    debug!(attempt, ?delay, error = %err, "retrying digest list fetch");
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn reconcile(
        &self,
        remote: &BTreeMap<MessageId, Digest>,
        cache: &mut MirrorCache,
        options: PassOptions,
        report: &mut SyncReport,
    ) {
        let local = self.logbook.digests();
        let ids: BTreeSet<MessageId> = local
            .keys()
            .chain(remote.keys())
            .copied()
            .chain(cache.ids())
            .collect();
        let mut next_free = local
            .keys()
            .chain(remote.keys())
            .max()
            .map_or(1, |max| max.saturating_add(1));

        for id in ids {
            let action = classify(local.get(&id).copied(), cache.get(id), remote.get(&id).copied());
            debug!(id, ?action, "classified");
            match action {
                Action::Converged(digest) => {
                    cache.set(id, digest);
                    report.converged += 1;
                }
                Action::Push => match self.push(id) {
                    Ok(digest) => {
                        cache.set(id, digest);
                        report.pushed.push(id);
                    }
                    Err(err) => self.transfer_failed(report, id, Operation::Push, &err),
                },
                Action::Pull => match self.pull(id) {
                    Ok(digest) => {
                        cache.set(id, digest);
                        report.pulled.push(id);
                    }
                    Err(err) => self.transfer_failed(report, id, Operation::Pull, &err),
                },
                Action::Conflict {
                    local,
                    remote,
                    cached,
                } => {
                    let conflict = Conflict {
                        id,
                        local,
                        remote,
                        cached,
                        local_location: self.local_location(id),
                        remote_location: self.transport.location(&self.config.logbook, id),
                    };
                    warn!(
                        id,
                        local = %conflict.local_location,
                        remote = %conflict.remote_location,
                        "entry changed on both sides"
                    );
                    report.conflicts.push(conflict);
                }
                Action::Collision => {
                    let after_local = self.logbook.max_id().map_or(1, |m| m.saturating_add(1));
                    let to = next_free.max(after_local);
                    if let Err(err) = self.logbook.move_entry(id, to) {
                        self.transfer_failed(report, id, Operation::Renumber, &err.into());
                        continue;
                    }
                    next_free = to.saturating_add(1);
                    info!(from = id, to, "renumbered local entry colliding with peer");
                    report.renumbered.push(Renumbered { from: id, to });
                    match self.pull(id) {
                        Ok(digest) => {
                            cache.set(id, digest);
                            report.pulled.push(id);
                        }
                        Err(err) => self.transfer_failed(report, id, Operation::Pull, &err),
                    }
                }
                Action::DeleteLocal => {
                    self.propagate_delete(id, Side::Local, cache, options, report);
                }
                Action::DeleteRemote => {
                    self.propagate_delete(id, Side::Remote, cache, options, report);
                }
                Action::Forget => {
                    cache.remove(id);
                }
            }
        }
    }

    fn propagate_delete(
        &self,
        id: MessageId,
        side: Side,
        cache: &mut MirrorCache,
        options: PassOptions,
        report: &mut SyncReport,
    ) {
        let deletion = Deletion { id, side };
        let confirmed = match self.config.deletion_policy {
            DeletionPolicy::Automatic => true,
            DeletionPolicy::Confirm => options.confirm_deletions,
            DeletionPolicy::Never => false,
        };
        if !confirmed {
            debug!(id, ?side, "deletion held back");
            report.pending_deletions.push(deletion);
            return;
        }

        let (operation, result) = match side {
            Side::Local => (Operation::DeleteLocal, self.delete_local(id)),
            Side::Remote => (Operation::DeleteRemote, self.delete_remote(id)),
        };
        match result {
            Ok(()) => {
                cache.remove(id);
                report.deletions.push(deletion);
            }
            Err(err) => self.transfer_failed(report, id, operation, &err),
        }
    }

    fn delete_local(&self, id: MessageId) -> SyncResult<()> {
        match self
            .logbook
            .delete(id, DeleteOptions::entry_only().attachments(true))
        {
            Ok(_) | Err(CoreError::NotFound { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_remote(&self, id: MessageId) -> SyncResult<()> {
        match self.transport.delete_entry(&self.config.logbook, id) {
            Err(SyncError::Remote { status: 404, .. }) => Ok(()),
            result => result,
        }
    }

    /// Sends the local copy with its attachments; returns the digest sent.
    fn push(&self, id: MessageId) -> SyncResult<Digest> {
        let raw = self.logbook.raw_record(id)?;
        let entry = decode_entry(&raw.bytes, Some(id)).map_err(CoreError::from)?;
        let mut transfer = EntryTransfer::new(raw.bytes)?;
        for name in entry.attachments {
            match self.logbook.attachments().get(&name) {
                Ok(data) => transfer = transfer.with_attachment(name, data),
                Err(CoreError::AttachmentNotFound { .. }) => {
                    warn!(id, attachment = %name, "attachment missing, pushing entry without it");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.transport
            .push_entry(&self.config.logbook, &transfer)?;
        Ok(raw.digest)
    }

    /// Fetches and stores the remote copy; returns the digest stored.
    fn pull(&self, id: MessageId) -> SyncResult<Digest> {
        let transfer = self.transport.pull_entry(&self.config.logbook, id)?;
        if transfer.id != id {
            return Err(SyncError::UnexpectedEntry {
                requested: id,
                received: transfer.id,
            });
        }
        for blob in &transfer.attachments {
            self.logbook.attachments().put(&blob.name, &blob.data)?;
        }
        self.logbook.store_record(&transfer.record)?;
        Ok(Digest::of(&transfer.record))
    }

    fn local_location(&self, id: MessageId) -> String {
        match self.logbook.index_entry(id) {
            Ok(entry) => format!(
                "{}/{id} ({} @ {})",
                self.logbook.name(),
                entry.file,
                entry.offset
            ),
            Err(_) => format!("{}/{id}", self.logbook.name()),
        }
    }

    fn transfer_failed(
        &self,
        report: &mut SyncReport,
        id: MessageId,
        operation: Operation,
        err: &SyncError,
    ) {
        warn!(id, ?operation, error = %err, "transfer failed, entry left for next pass");
        report.fail(id, operation, err);
    }
}

impl<T: MirrorTransport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("logbook", &self.config.logbook)
            .field("peer", &self.config.peer_url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
