//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
///
/// Decoding errors that mean "the bytes at this location are not the record
/// we expected" report `true` from [`CodecError::is_corruption`]; the entry
/// engine reacts to those by rebuilding its index. Everything else is a
/// caller mistake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes do not form a well-formed record.
    #[error("corrupt record: {message}")]
    CorruptRecord {
        /// Description of what was wrong.
        message: String,
    },

    /// The record is well formed but carries a different id.
    #[error("record id mismatch: expected {expected}, found {found}")]
    IdMismatch {
        /// The id the caller asked for.
        expected: u32,
        /// The id found in the record marker.
        found: u32,
    },

    /// The body contains a line that would be read back as a record marker.
    #[error("body contains a line starting with the record marker")]
    MarkerInBody,

    /// An attribute name or value cannot be represented in a header line.
    #[error("invalid attribute {name:?}: {reason}")]
    InvalidAttribute {
        /// Attribute name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An attribute is not part of the logbook schema.
    #[error("attribute {name:?} is not defined by the logbook schema")]
    UnknownAttribute {
        /// Attribute name.
        name: String,
    },

    /// Attributes are not in schema order.
    #[error("attribute {name:?} is out of schema order")]
    AttributeOrder {
        /// First attribute found out of order.
        name: String,
    },

    /// A header field other than an attribute holds an invalid value.
    #[error("invalid {field} value: {message}")]
    InvalidField {
        /// Header field name.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// A digest string is not 32 hex characters.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

impl CodecError {
    /// Create a corrupt record error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }

    /// Create an invalid attribute error.
    pub fn invalid_attribute(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error signals that stored bytes are not the
    /// record they were expected to be.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptRecord { .. } | Self::IdMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_classification() {
        assert!(CodecError::corrupt("missing marker").is_corruption());
        assert!(CodecError::IdMismatch {
            expected: 3,
            found: 4
        }
        .is_corruption());
        assert!(!CodecError::MarkerInBody.is_corruption());
        assert!(!CodecError::invalid_attribute("Subject", "newline").is_corruption());
    }
}
