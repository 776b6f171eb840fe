//! Error types for the sync engine.

use elog_codec::MessageId;
use elog_core::CoreError;
use elog_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a mirror pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The peer did not answer in time.
    #[error("request to peer timed out")]
    Timeout,

    /// The peer answered with an error status.
    #[error("peer answered {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The peer's answer is not valid mirror protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer sent a different entry than the one requested.
    #[error("requested entry {requested}, peer sent {received}")]
    UnexpectedEntry {
        /// Requested id.
        requested: MessageId,
        /// Id carried by the transfer.
        received: MessageId,
    },

    /// Local logbook error.
    #[error("logbook error: {0}")]
    Core(#[from] CoreError),

    /// Reading or writing the mirror cache failed.
    #[error("mirror cache {path}: {source}")]
    Cache {
        /// Cache file path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A pass for the same logbook and peer is already running.
    #[error("a mirror pass of {logbook} with {peer} is already running")]
    PassInProgress {
        /// Logbook name.
        logbook: String,
        /// Peer key.
        peer: String,
    },

    /// The transport has been closed.
    #[error("not connected to peer")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the error concerns a single entry transfer rather
    /// than the pass as a whole.
    pub fn is_transfer_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. }
                | SyncError::Timeout
                | SyncError::Remote { .. }
                | SyncError::Protocol(_)
                | SyncError::UnexpectedEntry { .. }
                | SyncError::NotConnected
        )
    }
}
