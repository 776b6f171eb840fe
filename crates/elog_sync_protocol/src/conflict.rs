//! Mirror conflicts.

use elog_codec::{Digest, MessageId};
use serde::Serialize;

/// An entry changed on both sides since the last pass.
///
/// Conflicts are never resolved automatically. The entry keeps its cached
/// digest, so every later pass reports it again until an operator makes
/// both copies equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// Entry id.
    pub id: MessageId,
    /// Digest of the local copy.
    pub local: Digest,
    /// Digest of the remote copy.
    pub remote: Digest,
    /// Remote digest recorded at the end of the last pass.
    pub cached: Digest,
    /// Where to look at the local copy.
    pub local_location: String,
    /// Where to look at the remote copy.
    pub remote_location: String,
}

impl Conflict {
    /// Returns true if neither side still matches the cached digest.
    #[must_use]
    pub fn both_changed(&self) -> bool {
        self.local != self.cached && self.remote != self.cached && self.local != self.remote
    }
}
