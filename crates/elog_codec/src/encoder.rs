//! Entry record encoder.

use crate::entry::Entry;
use crate::error::{CodecError, CodecResult};
use crate::schema::AttributeSchema;
use crate::{DATE_FORMAT, MARKER, SEPARATOR};
use chrono::{DateTime, FixedOffset, Timelike};

/// Encodes one entry into its on-disk record.
///
/// The record is the id marker line, the header lines in fixed order, the
/// separator line, the body verbatim, and one trailing newline. Records are
/// not length-prefixed; the next marker delimits the body.
///
/// # Errors
///
/// Fails without producing bytes if the entry cannot be read back
/// unchanged: attributes that break the schema, header values containing
/// newlines, attachment names containing commas, an empty lock owner, a
/// parent or reply id of 0, a date with sub-second precision or an offset
/// that is not whole minutes, or a body line that starts with the record
/// marker.
pub fn encode_entry(entry: &Entry, schema: &AttributeSchema) -> CodecResult<Vec<u8>> {
    if entry.id == 0 {
        return Err(CodecError::InvalidField {
            field: "id",
            message: "entry ids start at 1".into(),
        });
    }
    if entry.in_reply_to == Some(0) || entry.reply_to.contains(&0) {
        return Err(CodecError::InvalidField {
            field: "Reply to",
            message: "entry ids start at 1".into(),
        });
    }
    check_date(&entry.date)?;
    schema.validate(&entry.attributes)?;
    if body_has_marker(&entry.body) {
        return Err(CodecError::MarkerInBody);
    }
    for name in &entry.attachments {
        check_attachment_name(name)?;
    }
    if let Some(owner) = &entry.locked_by {
        if owner.is_empty() || owner.trim() != owner || owner.contains(['\n', '\r']) {
            return Err(CodecError::InvalidField {
                field: "Locked by",
                message: format!("unusable lock owner {owner:?}"),
            });
        }
    }

    let mut out = String::with_capacity(256 + entry.body.len());
    push_line(&mut out, MARKER, &entry.id.to_string());
    push_line(&mut out, "Date:", &entry.date.format(DATE_FORMAT).to_string());
    if !entry.reply_to.is_empty() {
        push_line(&mut out, "Reply to:", &join_ids(&entry.reply_to));
    }
    if let Some(parent) = entry.in_reply_to {
        push_line(&mut out, "In reply to:", &parent.to_string());
    }
    for attr in &entry.attributes {
        out.push_str(&attr.name);
        out.push_str(": ");
        out.push_str(&attr.value);
        out.push('\n');
    }
    push_line(&mut out, "Attachment:", &entry.attachments.join(", "));
    push_line(&mut out, "Encoding:", entry.encoding.as_str());
    if let Some(owner) = &entry.locked_by {
        push_line(&mut out, "Locked by:", owner);
    }
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(&entry.body);
    out.push('\n');

    Ok(out.into_bytes())
}

fn push_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push('\n');
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The date header carries whole seconds and a `+hhmm` offset.
fn check_date(date: &DateTime<FixedOffset>) -> CodecResult<()> {
    if date.nanosecond() != 0 {
        return Err(CodecError::InvalidField {
            field: "Date",
            message: format!("{date} has sub-second precision"),
        });
    }
    if date.offset().local_minus_utc() % 60 != 0 {
        return Err(CodecError::InvalidField {
            field: "Date",
            message: format!("offset {} is not whole minutes", date.offset()),
        });
    }
    Ok(())
}

fn check_attachment_name(name: &str) -> CodecResult<()> {
    if name.is_empty() || name.trim() != name || name.contains([',', '\n', '\r']) {
        return Err(CodecError::InvalidField {
            field: "Attachment",
            message: format!("unusable attachment name {name:?}"),
        });
    }
    Ok(())
}

/// Returns true if any line of `body` starts with the record marker.
pub fn body_has_marker(body: &str) -> bool {
    body.starts_with(MARKER) || body.contains(&format!("\n{MARKER}"))
}
