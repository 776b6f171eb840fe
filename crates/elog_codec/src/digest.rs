//! 128-bit content digest.

use crate::error::{CodecError, CodecResult};
use md5::{Digest as _, Md5};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 16;

/// MD5 digest of the exact bytes a record occupies on disk.
///
/// This is the only equality test between a local entry and its copy on a
/// mirror peer, so it must be computed over the raw record bytes and never
/// over a re-encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// All-zero placeholder. No record hashes to it in practice.
    pub const ZERO: Self = Self([0; DIGEST_LEN]);

    /// Computes the digest of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let out = Md5::digest(bytes);
        let mut raw = [0u8; DIGEST_LEN];
        raw.copy_from_slice(&out);
        Self(raw)
    }

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Returns the 32 lowercase hex characters used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        let s = s.trim();
        if s.len() != DIGEST_LEN * 2 {
            return Err(CodecError::InvalidDigest(format!(
                "expected {} hex characters, got {}",
                DIGEST_LEN * 2,
                s.len()
            )));
        }
        let mut raw = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut raw)
            .map_err(|e| CodecError::InvalidDigest(format!("{s:?}: {e}")))?;
        Ok(Self(raw))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
