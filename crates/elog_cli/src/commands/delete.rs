//! Delete command implementation.

use super::{is_json, Target};
use elog_core::{DeleteOptions, MessageId};

/// Runs the delete command.
pub fn run(
    target: &Target,
    id: MessageId,
    replies: bool,
    attachments: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let logbook = target.open()?;
    let options = DeleteOptions::default()
        .replies(replies)
        .attachments(attachments);
    let report = logbook.delete(id, options)?;

    if is_json(format) {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let deleted: Vec<String> = report.deleted.iter().map(|id| id.to_string()).collect();
    println!("Deleted entries: {}", deleted.join(", "));
    if !report.attachments_removed.is_empty() {
        println!("Removed attachments:");
        for name in &report.attachments_removed {
            println!("  {name}");
        }
    }
    if !report.is_complete() {
        println!("Incomplete cascade:");
        for failure in &report.failed {
            println!("  entry {}: {}", failure.id, failure.reason);
        }
    }
    Ok(())
}
