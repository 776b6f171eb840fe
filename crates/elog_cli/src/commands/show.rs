//! Show command implementation.

use super::{is_json, Target};
use elog_core::{Entry, MessageId};
use std::io::Write;

/// Runs the show command.
pub fn run(
    target: &Target,
    id: MessageId,
    raw: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let logbook = target.open()?;

    if raw {
        let record = logbook.raw_record(id)?;
        std::io::stdout().write_all(&record.bytes)?;
        return Ok(());
    }

    let entry = logbook.retrieve(id)?;
    if is_json(format) {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print!("{}", render_text(&entry));
    }
    Ok(())
}

fn render_text(entry: &Entry) -> String {
    let mut out = format!("Entry {}\n", entry.id);
    out.push_str(&format!("  Date:      {}\n", entry.date.to_rfc2822()));
    if let Some(parent) = entry.in_reply_to {
        out.push_str(&format!("  Reply to:  {parent}\n"));
    }
    if !entry.reply_to.is_empty() {
        let replies: Vec<String> = entry.reply_to.iter().map(|id| id.to_string()).collect();
        out.push_str(&format!("  Replies:   {}\n", replies.join(", ")));
    }
    if let Some(owner) = &entry.locked_by {
        out.push_str(&format!("  Locked by: {owner}\n"));
    }
    for attribute in &entry.attributes {
        out.push_str(&format!("  {}: {}\n", attribute.name, attribute.value));
    }
    for name in &entry.attachments {
        out.push_str(&format!("  Attachment: {name}\n"));
    }
    out.push('\n');
    out.push_str(&entry.body);
    if !entry.body.ends_with('\n') {
        out.push('\n');
    }
    out
}
