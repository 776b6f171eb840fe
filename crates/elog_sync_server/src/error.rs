//! Error types for the mirror server.

use elog_core::CoreError;
use elog_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while answering a mirror request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request body is not valid mirror protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No logbook with this name is served.
    #[error("unknown logbook {0:?}")]
    UnknownLogbook(String),

    /// The command needs the other HTTP method.
    #[error("{command} does not accept {method}")]
    MethodNotAllowed {
        /// Mirror command.
        command: &'static str,
        /// Method used.
        method: String,
    },

    /// The request body exceeds the configured limit.
    #[error("request body of {size} bytes exceeds {max}")]
    PayloadTooLarge {
        /// Body size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The operation is disabled on this server.
    #[error("not allowed: {0}")]
    Forbidden(String),

    /// Logbook error.
    #[error("logbook error: {0}")]
    Logbook(#[from] CoreError),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::Protocol(_)
            | ServerError::UnknownLogbook(_)
            | ServerError::MethodNotAllowed { .. }
            | ServerError::PayloadTooLarge { .. }
            | ServerError::Forbidden(_) => true,
            ServerError::Logbook(err) => err.is_user_facing(),
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Protocol(_) => 400,
            ServerError::Forbidden(_) => 403,
            ServerError::UnknownLogbook(_) => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::Logbook(err) => match err {
                CoreError::NotFound { .. } | CoreError::AttachmentNotFound { .. } => 404,
                CoreError::Conflict { .. } | CoreError::IdInUse { .. } => 409,
                CoreError::InvalidOperation { .. } | CoreError::Codec(_) => 400,
                _ => 500,
            },
        }
    }
}
