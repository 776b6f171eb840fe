//! Mirror pass harness.
//!
//! Wires a local logbook to an in-process [`MirrorServer`] through the
//! loopback HTTP client, so whole passes run without a network.

use elog_core::{IndexRegistry, Logbook, LogbookConfig, MessageId};
use elog_sync_engine::{
    DeletionPolicy, HttpTransport, LoopbackClient, LoopbackServer, PassOptions, RetryConfig,
    SyncConfig, SyncEngine, SyncReport,
};
use elog_sync_protocol::{Method, Url};
use elog_sync_server::{MirrorServer, ServerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

static NEXT_PEER: AtomicUsize = AtomicUsize::new(0);

/// Routes loopback requests into a mirror server.
#[derive(Debug, Clone)]
pub struct MirrorPeer(pub Arc<MirrorServer>);

impl LoopbackServer for MirrorPeer {
    fn handle_request(&self, method: Method, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let response = self.0.handle_request(method, path, body);
        (response.status, response.body)
    }
}

/// Engine type used by [`MirrorPair`].
pub type LoopbackEngine = SyncEngine<HttpTransport<LoopbackClient<MirrorPeer>>>;

/// Two copies of one logbook: a local one driven by a sync engine and a
/// remote one served by a mirror server.
pub struct MirrorPair {
    /// Engine owning the local logbook.
    pub engine: LoopbackEngine,
    /// The peer's logbook.
    pub remote: Arc<Logbook>,
    /// The peer server.
    pub server: Arc<MirrorServer>,
    _temp_dir: TempDir,
}

impl MirrorPair {
    /// Creates an empty pair with the given deletion policy.
    ///
    /// Every pair gets its own peer host name, so passes of different pairs
    /// never contend for the same pass guard.
    pub fn new(policy: DeletionPolicy) -> Self {
        Self::with_server(policy, ServerConfig::new("testkit-peer"))
    }

    /// Creates an empty pair whose peer uses `server_config`.
    pub fn with_server(policy: DeletionPolicy, server_config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let open = |dir: &str| {
            Logbook::open(
                LogbookConfig::new("mirror", temp_dir.path().join(dir)).sync_writes(false),
                &IndexRegistry::new(),
            )
            .expect("Failed to open logbook")
        };
        let local = open("local");
        let remote = Arc::new(open("remote"));

        let server = Arc::new(MirrorServer::new(server_config));
        server.add_logbook(Arc::clone(&remote));

        let host = format!("peer{}", NEXT_PEER.fetch_add(1, Ordering::Relaxed));
        let base = Url::parse(&format!("http://{host}.test/")).expect("Valid peer URL");
        let transport = HttpTransport::new(
            base.clone(),
            LoopbackClient::new(MirrorPeer(Arc::clone(&server))),
        );
        let config = SyncConfig::new("mirror", base)
            .with_deletion_policy(policy)
            .with_retry(RetryConfig::no_retry());

        Self {
            engine: SyncEngine::new(config, local, transport),
            remote,
            server,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the local logbook.
    pub fn local(&self) -> &Logbook {
        self.engine.logbook()
    }

    /// Runs one pass without confirming deletions.
    pub fn pass(&self) -> SyncReport {
        self.engine
            .run_pass(PassOptions::default())
            .expect("Mirror pass failed")
    }

    /// Runs one pass that carries out pending deletions.
    pub fn confirmed_pass(&self) -> SyncReport {
        self.engine
            .run_pass(PassOptions::confirmed())
            .expect("Mirror pass failed")
    }

    /// Runs passes until one moves nothing, up to `max` passes. Returns the
    /// number of passes run.
    pub fn settle(&self, max: usize) -> usize {
        for run in 1..=max {
            if self.pass().transfers() == 0 {
                return run;
            }
        }
        panic!("Mirror pair did not settle within {max} passes");
    }

    /// Copies a local record verbatim to the peer.
    pub fn seed_remote(&self, id: MessageId) {
        let raw = self.local().raw_record(id).expect("Local record exists");
        self.remote
            .store_record(&raw.bytes)
            .expect("Failed to seed remote");
    }

    /// Asserts that both copies hold the same ids with the same digests.
    pub fn assert_converged(&self) {
        assert_eq!(
            self.local().digests(),
            self.remote.digests(),
            "Local and remote logbooks differ"
        );
    }
}
