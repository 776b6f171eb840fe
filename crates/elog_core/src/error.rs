//! Error types for elog core.

use elog_codec::{CodecError, MessageId};
use elog_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// `NotFound`, `Conflict`, `IdInUse`, `InvalidOperation` and `Codec` are
/// caller-facing and recoverable. `CorruptRecord` triggers one index rebuild
/// and retry inside the engine before it is returned. `Storage`/`Io` and
/// `LegacyFormat` are operator diagnostics.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The entry cannot be encoded, or a submitted record cannot be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No entry with this id.
    #[error("entry {id} not found")]
    NotFound {
        /// The id that was looked up.
        id: MessageId,
    },

    /// No attachment with this name.
    #[error("attachment {name:?} not found")]
    AttachmentNotFound {
        /// The attachment file name.
        name: String,
    },

    /// The bytes the index points at are not the expected record.
    #[error("corrupt record in {file} at offset {offset}: {message}")]
    CorruptRecord {
        /// Log file name.
        file: String,
        /// Byte offset the index pointed at.
        offset: u64,
        /// What did not match.
        message: String,
    },

    /// Optimistic lock check failed on edit.
    #[error("entry {id} is locked by {actual:?}, expected {expected:?}")]
    Conflict {
        /// The entry being edited.
        id: MessageId,
        /// Lock owner the caller last observed.
        expected: Option<String>,
        /// Lock owner currently stored.
        actual: Option<String>,
    },

    /// A log file uses the pre-upgrade layout.
    #[error("log file {file} uses the legacy format; run the logbook converter first")]
    LegacyFormat {
        /// The offending log file.
        file: String,
    },

    /// The target id is already taken.
    #[error("entry id {id} is already in use")]
    IdInUse {
        /// The id that is taken.
        id: MessageId,
    },

    /// Operation not permitted.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt record error.
    pub fn corrupt_record(file: impl Into<String>, offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            file: file.into(),
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Maps a decode failure of a stored record to a core error, keeping the
    /// record's location when the failure means corruption.
    pub fn from_decode(err: CodecError, file: &str, offset: u64) -> Self {
        if err.is_corruption() {
            Self::corrupt_record(file, offset, err.to_string())
        } else {
            Self::Codec(err)
        }
    }

    /// Returns true if this error should trigger an index rebuild.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptRecord { .. })
    }

    /// Returns true if the error is an ordinary caller-facing failure rather
    /// than an operator diagnostic.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AttachmentNotFound { .. }
                | Self::Conflict { .. }
                | Self::IdInUse { .. }
                | Self::InvalidOperation { .. }
                | Self::Codec(_)
        )
    }

    /// Returns true if the error is a missing file.
    pub fn is_missing_file(&self) -> bool {
        match self {
            Self::Io(e) | Self::Storage(StorageError::Io(e)) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
