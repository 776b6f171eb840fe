//! Entry transfer framing.
//!
//! A transfer carries one record's exact bytes plus its attachments:
//!
//! ```text
//! RECORD <len>\n<len bytes>
//! ATTACHMENT <name> <len>\n<len bytes>
//! ATTACHMENT <name> <len>\n<len bytes>
//! ```
//!
//! The record bytes are never re-encoded, so the receiver stores exactly
//! what the sender hashed.

use crate::error::{ProtocolError, ProtocolResult};
use elog_codec::{peek_id, MessageId};

const RECORD_TAG: &str = "RECORD";
const ATTACHMENT_TAG: &str = "ATTACHMENT";

/// An attachment travelling with an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentBlob {
    /// Stored attachment name.
    pub name: String,
    /// Attachment bytes.
    pub data: Vec<u8>,
}

/// One entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTransfer {
    /// Entry id, taken from the record's marker line.
    pub id: MessageId,
    /// The record's exact stored bytes.
    pub record: Vec<u8>,
    /// Attachments listed by the record that the sender holds.
    pub attachments: Vec<AttachmentBlob>,
}

impl EntryTransfer {
    /// Wraps a raw record.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the record has no valid marker line.
    pub fn new(record: Vec<u8>) -> ProtocolResult<Self> {
        let id = peek_id(&record)?;
        Ok(Self {
            id,
            record,
            attachments: Vec::new(),
        })
    }

    /// Adds an attachment.
    #[must_use]
    pub fn with_attachment(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachments.push(AttachmentBlob {
            name: name.into(),
            data,
        });
        self
    }

    /// Encodes the transfer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Framing`] if an attachment name is empty or
    /// contains a newline.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let size = self.record.len()
            + self.attachments.iter().map(|a| a.data.len() + a.name.len() + 32).sum::<usize>()
            + 32;
        let mut out = Vec::with_capacity(size);

        out.extend_from_slice(format!("{RECORD_TAG} {}\n", self.record.len()).as_bytes());
        out.extend_from_slice(&self.record);

        for attachment in &self.attachments {
            if attachment.name.is_empty() || attachment.name.contains(['\n', '\r']) {
                return Err(ProtocolError::framing(format!(
                    "attachment name {:?} cannot be framed",
                    attachment.name
                )));
            }
            out.extend_from_slice(
                format!("{ATTACHMENT_TAG} {} {}\n", attachment.name, attachment.data.len())
                    .as_bytes(),
            );
            out.extend_from_slice(&attachment.data);
        }
        Ok(out)
    }

    /// Decodes a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Framing`] for a bad header or a length that
    /// runs past the end, or a codec error if the record has no valid
    /// marker line.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let header = reader.line()?;
        let len = header
            .strip_prefix(RECORD_TAG)
            .and_then(|rest| rest.strip_prefix(' '))
            .and_then(|len| len.parse::<usize>().ok())
            .ok_or_else(|| ProtocolError::framing(format!("bad record header {header:?}")))?;
        let mut transfer = Self::new(reader.take(len)?.to_vec())?;

        while !reader.is_done() {
            let header = reader.line()?;
            let (name, len) = header
                .strip_prefix(ATTACHMENT_TAG)
                .and_then(|rest| rest.strip_prefix(' '))
                .and_then(|rest| rest.rsplit_once(' '))
                .and_then(|(name, len)| Some((name, len.parse::<usize>().ok()?)))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| ProtocolError::framing(format!("bad attachment header {header:?}")))?;
            let name = name.to_string();
            let data = reader.take(len)?.to_vec();
            transfer.attachments.push(AttachmentBlob { name, data });
        }
        Ok(transfer)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn line(&mut self) -> ProtocolResult<String> {
        let rest = &self.bytes[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| ProtocolError::framing("unterminated header line"))?;
        self.pos += end + 1;
        String::from_utf8(rest[..end].to_vec())
            .map_err(|_| ProtocolError::framing("header line is not UTF-8"))
    }

    fn take(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                ProtocolError::framing(format!(
                    "{len} bytes announced, {} left",
                    self.bytes.len() - self.pos
                ))
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}
