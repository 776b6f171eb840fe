//! End-to-end mirror passes against an in-process peer server.

use elog_core::{DeleteOptions, Draft, IndexRegistry, Logbook, LogbookConfig, MessageId};
use elog_sync_engine::{
    DeletionPolicy, HttpTransport, LoopbackClient, LoopbackServer, PassOptions, RetryConfig, Side,
    SyncConfig, SyncEngine, SyncError,
};
use elog_sync_protocol::{Method, Url};
use elog_sync_server::{MirrorServer, ServerConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// Routes loopback requests into a mirror server.
struct Peer(Arc<MirrorServer>);

impl LoopbackServer for Peer {
    fn handle_request(&self, method: Method, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let response = self.0.handle_request(method, path, body);
        (response.status, response.body)
    }
}

type Engine = SyncEngine<HttpTransport<LoopbackClient<Peer>>>;

struct Pair {
    _temp: TempDir,
    local: Engine,
    remote: Arc<Logbook>,
    server: Arc<MirrorServer>,
}

impl Pair {
    fn new(host: &str, policy: DeletionPolicy) -> Self {
        Self::with_server(host, policy, ServerConfig::new("remote-elog"))
    }

    fn with_server(host: &str, policy: DeletionPolicy, server_config: ServerConfig) -> Self {
        let temp = TempDir::new().unwrap();
        let registry = IndexRegistry::new();
        let local = Logbook::open(
            LogbookConfig::new("Linac", temp.path().join("local")),
            &registry,
        )
        .unwrap();
        let remote = Arc::new(
            Logbook::open(
                LogbookConfig::new("Linac", temp.path().join("remote")),
                &registry,
            )
            .unwrap(),
        );

        let server = Arc::new(MirrorServer::new(server_config));
        server.add_logbook(Arc::clone(&remote));

        let base = Url::parse(&format!("http://{host}.test/elog/")).unwrap();
        let transport = HttpTransport::new(
            base.clone(),
            LoopbackClient::new(Peer(Arc::clone(&server))),
        );
        let config = SyncConfig::new("Linac", base)
            .with_deletion_policy(policy)
            .with_retry(RetryConfig::no_retry());

        Self {
            _temp: temp,
            local: SyncEngine::new(config, local, transport),
            remote,
            server,
        }
    }

    fn local(&self) -> &Logbook {
        self.local.logbook()
    }

    /// Copies the local record verbatim to the peer.
    fn seed_remote(&self, id: MessageId) {
        let raw = self.local().raw_record(id).unwrap();
        self.remote.store_record(&raw.bytes).unwrap();
    }

    fn pass(&self) -> elog_sync_engine::SyncReport {
        self.local.run_pass(PassOptions::default()).unwrap()
    }
}

fn draft(body: &str) -> Draft {
    Draft::new().attribute("Author", "ops").body(body)
}

#[test]
fn identical_stores_converge_without_transfers() {
    let pair = Pair::new("converge", DeletionPolicy::Confirm);
    for body in ["one", "two", "three"] {
        let id = pair.local().submit(None, draft(body)).unwrap();
        pair.seed_remote(id);
    }

    let report = pair.pass();
    assert_eq!(report.converged, 3);
    assert_eq!(report.transfers(), 0);
    assert_eq!(report.peer, "remote-elog");

    // The cache now equals the remote digest list.
    let cache = pair.local.load_cache().unwrap();
    for (id, digest) in pair.remote.digests() {
        assert_eq!(cache.get(id), Some(digest));
    }
    assert_eq!(cache.len(), 3);

    let report = pair.pass();
    assert_eq!(report.transfers(), 0);
}

#[test]
fn new_entries_flow_both_ways() {
    let pair = Pair::new("both-ways", DeletionPolicy::Confirm);
    let local_id = pair.local().submit(None, draft("written here")).unwrap();
    let report = pair.pass();
    assert_eq!(report.pushed, vec![local_id]);

    let remote_id = pair.remote.submit(None, draft("written there")).unwrap();
    let report = pair.pass();
    assert_eq!(report.pulled, vec![remote_id]);
    assert_eq!(pair.local().retrieve(remote_id).unwrap().body, "written there");
    assert_eq!(pair.local().digests(), pair.remote.digests());

    assert_eq!(pair.pass().transfers(), 0);
}

#[test]
fn conflict_is_reported_every_pass() {
    let pair = Pair::new("conflict", DeletionPolicy::Confirm);
    for i in 1..=5 {
        pair.local().submit(None, draft(&format!("entry {i}"))).unwrap();
    }
    pair.pass();

    pair.local().submit(Some(5), draft("local edit")).unwrap();
    pair.remote.submit(Some(5), draft("remote edit")).unwrap();

    for _ in 0..2 {
        let report = pair.pass();
        assert_eq!(report.transfers(), 0);
        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.id, 5);
        assert!(conflict.both_changed());
        assert!(conflict.local_location.starts_with("Linac/5"));
        assert_eq!(conflict.remote_location, "http://conflict.test/elog/Linac/5");
    }

    assert_eq!(pair.local().retrieve(5).unwrap().body, "local edit");
    assert_eq!(pair.remote.retrieve(5).unwrap().body, "remote edit");
}

#[test]
fn colliding_ids_are_renumbered() {
    let pair = Pair::new("collision", DeletionPolicy::Confirm);
    for i in 1..=6 {
        pair.local().submit(None, draft(&format!("entry {i}"))).unwrap();
    }
    pair.pass();

    let local_id = pair.local().submit(None, draft("local seven")).unwrap();
    let remote_id = pair.remote.submit(None, draft("remote seven")).unwrap();
    assert_eq!((local_id, remote_id), (7, 7));

    let report = pair.pass();
    assert_eq!(report.renumbered.len(), 1);
    assert_eq!(report.renumbered[0].from, 7);
    assert_eq!(report.renumbered[0].to, 8);
    assert_eq!(report.pulled, vec![7]);

    assert_eq!(pair.local().retrieve(7).unwrap().body, "remote seven");
    assert_eq!(pair.local().retrieve(8).unwrap().body, "local seven");
    assert_eq!(pair.remote.retrieve(7).unwrap().body, "remote seven");

    // The moved entry goes out as a new entry on the next pass.
    let report = pair.pass();
    assert_eq!(report.pushed, vec![8]);
    assert_eq!(pair.remote.retrieve(8).unwrap().body, "local seven");
}

#[test]
fn colliding_replies_stay_linked_to_their_parent() {
    let pair = Pair::new("reply-collision", DeletionPolicy::Confirm);
    let head = pair.local().submit(None, draft("head")).unwrap();
    pair.pass();

    let local_reply = pair.local().submit(None, draft("local reply").reply_to(head)).unwrap();
    let remote_reply = pair.remote.submit(None, draft("remote reply").reply_to(head)).unwrap();
    assert_eq!((local_reply, remote_reply), (2, 2));

    let report = pair.pass();
    assert_eq!(report.renumbered.len(), 1);
    assert_eq!(report.renumbered[0].to, 3);
    assert_eq!(report.pulled, vec![2]);

    let report = pair.pass();
    assert!(report.conflicts.is_empty());
    assert_eq!(report.pushed, vec![head, 3]);
    assert_eq!(pair.pass().transfers(), 0);

    for book in [pair.local(), &*pair.remote] {
        let mut replies = book.retrieve(head).unwrap().reply_to;
        replies.sort_unstable();
        assert_eq!(replies, vec![2, 3]);
        assert_eq!(book.retrieve(2).unwrap().in_reply_to, Some(head));
        assert_eq!(book.retrieve(3).unwrap().in_reply_to, Some(head));
        assert!(book.verify().unwrap().is_clean());
    }
    assert_eq!(pair.local().digests(), pair.remote.digests());
}

#[test]
fn deletions_wait_for_confirmation() {
    let pair = Pair::new("two-phase", DeletionPolicy::Confirm);
    let keep = pair.local().submit(None, draft("keep")).unwrap();
    let doomed = pair.local().submit(None, draft("doomed")).unwrap();
    pair.pass();

    pair.local()
        .delete(doomed, DeleteOptions::default())
        .unwrap();

    let report = pair.pass();
    assert_eq!(report.pending_deletions.len(), 1);
    assert_eq!(report.pending_deletions[0].side, Side::Remote);
    assert!(pair.remote.contains(doomed));

    let report = pair.local.run_pass(PassOptions::confirmed()).unwrap();
    assert_eq!(report.deletions.len(), 1);
    assert_eq!(pair.remote.ids(), vec![keep]);

    let report = pair.pass();
    assert!(report.is_settled());
    assert_eq!(pair.local.load_cache().unwrap().len(), 1);
}

#[test]
fn remote_edit_restores_locally_deleted_entry() {
    let pair = Pair::new("restore", DeletionPolicy::Automatic);
    let id = pair.local().submit(None, draft("v1")).unwrap();
    pair.pass();

    pair.local().delete(id, DeleteOptions::default()).unwrap();
    pair.remote.submit(Some(id), draft("v2")).unwrap();

    let report = pair.pass();
    assert_eq!(report.pulled, vec![id]);
    assert!(report.deletions.is_empty());
    assert_eq!(pair.local().retrieve(id).unwrap().body, "v2");
}

#[test]
fn refused_delete_leaves_entry_unresolved() {
    let pair = Pair::with_server(
        "refused",
        DeletionPolicy::Automatic,
        ServerConfig::new("remote-elog").with_deletes(false),
    );
    let id = pair.local().submit(None, draft("stays remote")).unwrap();
    pair.pass();
    pair.local().delete(id, DeleteOptions::default()).unwrap();

    let report = pair.pass();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, id);
    assert!(report.failures[0].reason.contains("403"));
    // Still cached, so the next pass tries again.
    assert!(pair.local.load_cache().unwrap().get(id).is_some());
    assert!(pair.server.logbook("Linac").unwrap().contains(id));
}

/// A peer that answers the digest request with something else.
struct Impostor;

impl LoopbackServer for Impostor {
    fn handle_request(&self, _method: Method, _path: &str, _body: &[u8]) -> (u16, Vec<u8>) {
        (200, b"<html>Welcome</html>\n".to_vec())
    }
}

#[test]
fn unbannered_digest_list_aborts_pass() {
    let temp = TempDir::new().unwrap();
    let logbook = Logbook::open(
        LogbookConfig::new("Linac", temp.path().join("local")),
        &IndexRegistry::new(),
    )
    .unwrap();
    let id = logbook.submit(None, draft("untouched")).unwrap();
    let base = Url::parse("http://impostor.test/").unwrap();
    let engine = SyncEngine::new(
        SyncConfig::new("Linac", base.clone()).with_retry(RetryConfig::no_retry()),
        logbook,
        HttpTransport::new(base, LoopbackClient::new(Impostor)),
    );

    let err = engine.run_pass(PassOptions::default()).unwrap_err();
    assert!(matches!(err, SyncError::Protocol(_)));
    assert!(!engine.cache_path().exists());
    assert_eq!(engine.logbook().ids(), vec![id]);
}
