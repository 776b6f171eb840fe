//! Error types for the mirror protocol.

use elog_codec::CodecError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while parsing mirror wire formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The first line of a digest list is not a mirror banner.
    #[error("invalid mirror banner: {line:?}")]
    InvalidBanner {
        /// The offending line.
        line: String,
    },

    /// The peer speaks an incompatible protocol version.
    #[error("unsupported mirror protocol version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version announced by the peer.
        major: u16,
        /// Minor version announced by the peer.
        minor: u16,
    },

    /// A line of a digest list or cache file cannot be parsed.
    #[error("malformed line {line_no}: {line:?}")]
    MalformedLine {
        /// One-based line number.
        line_no: usize,
        /// The offending line.
        line: String,
    },

    /// The same id appears twice.
    #[error("duplicate id {id} on line {line_no}")]
    DuplicateId {
        /// The repeated id.
        id: u32,
        /// One-based line number of the second occurrence.
        line_no: usize,
    },

    /// A request path or query is not a mirror request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An entry transfer body is malformed.
    #[error("invalid transfer framing: {0}")]
    Framing(String),

    /// The transferred record cannot be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ProtocolError {
    /// Creates a framing error.
    pub fn framing(message: impl Into<String>) -> Self {
        Self::Framing(message.into())
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
