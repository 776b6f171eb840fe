//! Per-entry classification of a mirror pass.
//!
//! Each id is classified from three possibly absent digests: the local
//! copy, the copy recorded in the mirror cache at the end of the last pass,
//! and the remote copy.

use elog_codec::Digest;

/// What a pass does with one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Both copies are equal; cache this digest.
    Converged(Digest),
    /// Send the local copy to the peer.
    Push,
    /// Fetch the remote copy.
    Pull,
    /// Both copies changed differently since the last pass.
    Conflict {
        /// Local digest.
        local: Digest,
        /// Remote digest.
        remote: Digest,
        /// Cached digest.
        cached: Digest,
    },
    /// Both sides created an entry under this id independently.
    Collision,
    /// The peer deleted an entry unchanged here.
    DeleteLocal,
    /// This side deleted an entry unchanged on the peer.
    DeleteRemote,
    /// Gone on both sides; drop the cache line.
    Forget,
}

impl Action {
    /// Returns true if the action moves entry data over the network.
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            Action::Push | Action::Pull | Action::Collision | Action::DeleteRemote
        )
    }
}

/// Classifies one id.
pub fn classify(local: Option<Digest>, cached: Option<Digest>, remote: Option<Digest>) -> Action {
    match (local, cached, remote) {
        (Some(l), _, Some(r)) if l == r => Action::Converged(l),
        (Some(_), None, Some(_)) => Action::Collision,
        (Some(l), Some(c), Some(r)) => {
            if r == c {
                Action::Push
            } else if l == c {
                Action::Pull
            } else {
                Action::Conflict {
                    local: l,
                    remote: r,
                    cached: c,
                }
            }
        }
        (Some(_), None, None) => Action::Push,
        // Deleted remotely. An edit made here since the last pass wins.
        (Some(l), Some(c), None) => {
            if l == c {
                Action::DeleteLocal
            } else {
                Action::Push
            }
        }
        (None, None, Some(_)) => Action::Pull,
        // Deleted here. An edit made on the peer since the last pass wins.
        (None, Some(c), Some(r)) => {
            if r == c {
                Action::DeleteRemote
            } else {
                Action::Pull
            }
        }
        (None, _, None) => Action::Forget,
    }
}
