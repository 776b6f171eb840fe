//! The digest list a peer serves for a logbook.
//!
//! ```text
//! ELOG-MIRROR/1.0 lab-server
//! ID:1 MD5:9e107d9d372bb6826bd81d3542a419d6
//! ID:2 MD5:e4d909c290d0fb1ca068ffaddf22cbd0
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use elog_codec::{Digest, MessageId};
use std::collections::BTreeMap;
use std::fmt;

/// Banner prefix every digest list starts with.
pub const BANNER_PREFIX: &str = "ELOG-MIRROR/";

/// Protocol version this crate speaks. Peers must agree on the major part.
pub const PROTOCOL_VERSION: (u16, u16) = (1, 0);

/// A peer's `{id: digest}` map, as served over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestList {
    /// Server name from the banner.
    pub server: String,
    /// Protocol version from the banner.
    pub version: (u16, u16),
    /// Digest of every entry the peer holds.
    pub digests: BTreeMap<MessageId, Digest>,
}

impl DigestList {
    /// Creates a list for `server` at the current protocol version.
    pub fn new(server: impl Into<String>, digests: BTreeMap<MessageId, Digest>) -> Self {
        Self {
            server: server.into(),
            version: PROTOCOL_VERSION,
            digests,
        }
    }

    /// Parses a digest list, validating the banner first.
    ///
    /// Blank lines are ignored; so is a trailing `\r` on any line.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidBanner`] if the first line is not a banner
    /// - [`ProtocolError::UnsupportedVersion`] on a major version mismatch
    /// - [`ProtocolError::MalformedLine`] or [`ProtocolError::DuplicateId`]
    ///   for a bad entry line
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let mut lines = text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l));
        let banner = lines.next().unwrap_or_default();
        let (version, server) = parse_banner(banner)?;
        if version.0 != PROTOCOL_VERSION.0 {
            return Err(ProtocolError::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }

        let mut digests = BTreeMap::new();
        for (i, line) in lines.enumerate() {
            let line_no = i + 2;
            if line.trim().is_empty() {
                continue;
            }
            let (id, digest) = parse_line(line).ok_or_else(|| ProtocolError::MalformedLine {
                line_no,
                line: line.to_string(),
            })?;
            if digests.insert(id, digest).is_some() {
                return Err(ProtocolError::DuplicateId { id, line_no });
            }
        }

        Ok(Self {
            server,
            version,
            digests,
        })
    }

    /// Renders the list in wire format.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Returns true if the peer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl fmt::Display for DigestList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{BANNER_PREFIX}{}.{} {}",
            self.version.0, self.version.1, self.server
        )?;
        for (id, digest) in &self.digests {
            writeln!(f, "ID:{id} MD5:{digest}")?;
        }
        Ok(())
    }
}

fn parse_banner(line: &str) -> ProtocolResult<((u16, u16), String)> {
    let invalid = || ProtocolError::InvalidBanner {
        line: line.to_string(),
    };
    let rest = line.strip_prefix(BANNER_PREFIX).ok_or_else(invalid)?;
    let (version, server) = rest.split_once(' ').unwrap_or((rest, ""));
    let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
    let major = major.parse().map_err(|_| invalid())?;
    let minor = minor.parse().map_err(|_| invalid())?;
    Ok(((major, minor), server.trim().to_string()))
}

fn parse_line(line: &str) -> Option<(MessageId, Digest)> {
    let (id, digest) = line.trim().split_once(char::is_whitespace)?;
    let id = id.strip_prefix("ID:")?.parse().ok()?;
    let digest = digest.trim_start().strip_prefix("MD5:")?.parse().ok()?;
    Some((id, digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DigestList {
        let digests = [(1, Digest::of(b"one")), (12, Digest::of(b"twelve"))]
            .into_iter()
            .collect();
        DigestList::new("lab", digests)
    }

    #[test]
    fn renders_wire_format() {
        let text = sample().render();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ELOG-MIRROR/1.0 lab"));
        assert_eq!(
            lines.next(),
            Some(format!("ID:1 MD5:{}", Digest::of(b"one")).as_str())
        );
        assert!(text.ends_with('\n'));
        assert_eq!(DigestList::parse(&text).unwrap(), sample());
    }

    #[test]
    fn rejects_missing_banner() {
        let text = format!("ID:1 MD5:{}\n", Digest::of(b"one"));
        assert!(matches!(
            DigestList::parse(&text),
            Err(ProtocolError::InvalidBanner { .. })
        ));
        assert!(matches!(
            DigestList::parse("<html>Login required</html>"),
            Err(ProtocolError::InvalidBanner { .. })
        ));
        assert!(DigestList::parse("").is_err());
    }

    #[test]
    fn checks_major_version() {
        assert!(matches!(
            DigestList::parse("ELOG-MIRROR/2.0 future\n"),
            Err(ProtocolError::UnsupportedVersion { major: 2, minor: 0 })
        ));
        let newer_minor = DigestList::parse("ELOG-MIRROR/1.7 lab\n").unwrap();
        assert_eq!(newer_minor.version, (1, 7));
        assert!(newer_minor.is_empty());
    }

    #[test]
    fn tolerates_crlf_and_blank_lines() {
        let text = format!(
            "ELOG-MIRROR/1.0 lab\r\n\r\nID:3 MD5:{}\r\n",
            Digest::of(b"x").to_hex().to_uppercase()
        );
        let list = DigestList::parse(&text).unwrap();
        assert_eq!(list.digests[&3], Digest::of(b"x"));
    }

    #[test]
    fn rejects_bad_lines() {
        let bad = "ELOG-MIRROR/1.0 lab\nID:x MD5:00\n";
        assert!(matches!(
            DigestList::parse(bad),
            Err(ProtocolError::MalformedLine { line_no: 2, .. })
        ));

        let dup = format!(
            "ELOG-MIRROR/1.0 lab\nID:1 MD5:{0}\nID:1 MD5:{0}\n",
            Digest::of(b"a")
        );
        assert!(matches!(
            DigestList::parse(&dup),
            Err(ProtocolError::DuplicateId { id: 1, line_no: 3 })
        ));
    }
}
