//! Entry record decoder and record splitter.

use crate::entry::{Attribute, Encoding, Entry, MessageId};
use crate::error::{CodecError, CodecResult};
use crate::{MARKER, SEPARATOR};
use chrono::DateTime;
use std::ops::Range;

/// Finds the next record marker at a line start, searching from `from`.
fn find_marker(buf: &[u8], from: usize) -> Option<usize> {
    let marker = MARKER.as_bytes();
    let mut pos = from;
    while pos + marker.len() <= buf.len() {
        let rel = buf[pos..]
            .windows(marker.len())
            .position(|w| w == marker)?;
        let at = pos + rel;
        if at == 0 || buf[at - 1] == b'\n' {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// Length of the record starting at `bytes[0]`: up to the next line-start
/// marker, or the whole slice if there is none.
#[must_use]
pub fn record_len(bytes: &[u8]) -> usize {
    find_marker(bytes, 1).unwrap_or(bytes.len())
}

/// Splits a whole log file into record byte ranges.
///
/// Ranges are contiguous and cover the entire buffer. If the buffer does not
/// start with a marker, the first range covers the leading bytes up to the
/// first marker; decoding it fails, which is how callers notice garbage.
#[must_use]
pub fn record_ranges(buf: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < buf.len() {
        let end = find_marker(buf, start + 1).unwrap_or(buf.len());
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Reads the id from a record's marker line without decoding the rest.
///
/// # Errors
///
/// Returns a corruption error if the marker or id is missing.
pub fn peek_id(bytes: &[u8]) -> CodecResult<MessageId> {
    let mut pos = 0;
    let line = next_line(bytes, &mut pos)
        .ok_or_else(|| CodecError::corrupt("empty record"))?;
    parse_marker_line(line)
}

fn parse_marker_line(line: &[u8]) -> CodecResult<MessageId> {
    let rest = line
        .strip_prefix(MARKER.as_bytes())
        .ok_or_else(|| CodecError::corrupt("record does not start with the id marker"))?;
    let text = String::from_utf8_lossy(rest);
    let id: MessageId = text
        .trim()
        .parse()
        .map_err(|_| CodecError::corrupt(format!("unparsable id {:?}", text.trim())))?;
    if id == 0 {
        return Err(CodecError::corrupt("id 0 in record marker"));
    }
    Ok(id)
}

fn next_line<'a>(bytes: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    if *pos >= bytes.len() {
        return None;
    }
    let rest = &bytes[*pos..];
    let (line, advance) = match rest.iter().position(|&b| b == b'\n') {
        Some(i) => (&rest[..i], i + 1),
        None => (rest, rest.len()),
    };
    *pos += advance;
    Some(line.strip_suffix(b"\r").unwrap_or(line))
}

fn parse_ids(field: &'static str, value: &str) -> CodecResult<Vec<MessageId>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| CodecError::InvalidField {
                field,
                message: format!("{s:?} is not an id"),
            })
        })
        .collect()
}

/// Decodes the record at the start of `bytes`.
///
/// Only the first record is read; anything from the next line-start marker
/// on is ignored. When `expected_id` is given, a record carrying another id
/// is rejected with [`CodecError::IdMismatch`].
///
/// # Errors
///
/// Returns a corruption error (see [`CodecError::is_corruption`]) if the
/// marker, id, `Date` header or separator is missing or malformed, and
/// [`CodecError::InvalidField`] if a reply list holds a non-numeric id.
pub fn decode_entry(bytes: &[u8], expected_id: Option<MessageId>) -> CodecResult<Entry> {
    let rec = &bytes[..record_len(bytes)];
    let mut pos = 0;

    let first = next_line(rec, &mut pos).ok_or_else(|| CodecError::corrupt("empty record"))?;
    let id = parse_marker_line(first)?;
    if let Some(expected) = expected_id {
        if expected != id {
            return Err(CodecError::IdMismatch {
                expected,
                found: id,
            });
        }
    }

    let mut date = None;
    let mut reply_to = Vec::new();
    let mut in_reply_to = None;
    let mut attributes = Vec::new();
    let mut attachments = Vec::new();
    let mut encoding = Encoding::Plain;
    let mut locked_by = None;

    loop {
        let line = next_line(rec, &mut pos)
            .ok_or_else(|| CodecError::corrupt(format!("record {id} has no separator line")))?;
        if line == SEPARATOR.as_bytes() {
            break;
        }

        let text = String::from_utf8_lossy(line);
        let (key, value) = text
            .split_once(':')
            .ok_or_else(|| CodecError::corrupt(format!("malformed header line {text:?}")))?;
        let value = value.strip_prefix(' ').unwrap_or(value);

        match key {
            k if k.eq_ignore_ascii_case("Date") => {
                let parsed = DateTime::parse_from_rfc2822(value.trim()).map_err(|e| {
                    CodecError::corrupt(format!("record {id} has bad date {value:?}: {e}"))
                })?;
                date = Some(parsed);
            }
            k if k.eq_ignore_ascii_case("Reply to") => reply_to = parse_ids("Reply to", value)?,
            k if k.eq_ignore_ascii_case("In reply to") => {
                in_reply_to = parse_ids("In reply to", value)?
                    .into_iter()
                    .find(|&parent| parent != 0);
            }
            k if k.eq_ignore_ascii_case("Attachment") => {
                attachments = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            k if k.eq_ignore_ascii_case("Encoding") => {
                encoding = value.parse().unwrap_or_default();
            }
            k if k.eq_ignore_ascii_case("Locked by") => {
                locked_by = Some(value.trim().to_string()).filter(|s| !s.is_empty());
            }
            _ => attributes.push(Attribute::new(key, value)),
        }
    }

    let date = date.ok_or_else(|| CodecError::corrupt(format!("record {id} has no Date header")))?;

    let body = &rec[pos..];
    let body = body.strip_suffix(b"\n").unwrap_or(body);

    Ok(Entry {
        id,
        date,
        reply_to,
        in_reply_to,
        attributes,
        attachments,
        encoding,
        locked_by,
        body: String::from_utf8_lossy(body).into_owned(),
    })
}
