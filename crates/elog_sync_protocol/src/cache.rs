//! The mirror cache file format.
//!
//! The cache remembers, per (logbook, peer), the remote digest of every id
//! as seen at the end of the last pass:
//!
//! ```text
//! ID1: 9e107d9d372bb6826bd81d3542a419d6
//! ID2: e4d909c290d0fb1ca068ffaddf22cbd0
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use elog_codec::{Digest, MessageId};
use std::collections::BTreeMap;

/// Last-seen remote digests, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorCache {
    entries: BTreeMap<MessageId, Digest>,
}

impl MirrorCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a cache file. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedLine`] for a line that is not
    /// `ID<id>: <hex>`, and [`ProtocolError::DuplicateId`] for a repeated id.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let mut entries = BTreeMap::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = || ProtocolError::MalformedLine {
                line_no: i + 1,
                line: line.to_string(),
            };
            let (id, digest) = line
                .strip_prefix("ID")
                .and_then(|rest| rest.split_once(':'))
                .ok_or_else(malformed)?;
            let id: MessageId = id.parse().map_err(|_| malformed())?;
            let digest: Digest = digest.trim().parse().map_err(|_| malformed())?;
            if entries.insert(id, digest).is_some() {
                return Err(ProtocolError::DuplicateId { id, line_no: i + 1 });
            }
        }
        Ok(Self { entries })
    }

    /// Renders the cache, one line per id in ascending order.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(id, digest)| format!("ID{id}: {digest}\n"))
            .collect()
    }

    /// Returns the cached digest of `id`.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<Digest> {
        self.entries.get(&id).copied()
    }

    /// Records the digest of `id`.
    pub fn set(&mut self, id: MessageId, digest: Digest) {
        self.entries.insert(id, digest);
    }

    /// Forgets `id`.
    pub fn remove(&mut self, id: MessageId) -> Option<Digest> {
        self.entries.remove(&id)
    }

    /// Iterates over the cached ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.entries.keys().copied()
    }

    /// Returns the number of cached ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(MessageId, Digest)> for MirrorCache {
    fn from_iter<I: IntoIterator<Item = (MessageId, Digest)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
