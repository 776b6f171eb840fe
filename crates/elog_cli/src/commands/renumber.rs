//! Renumber command implementation.

use super::Target;
use elog_core::MessageId;

/// Runs the renumber command.
pub fn run(
    target: &Target,
    old: MessageId,
    new: MessageId,
) -> Result<(), Box<dyn std::error::Error>> {
    let logbook = target.open()?;
    logbook.move_entry(old, new)?;
    println!("Moved entry {old} to {new}");
    Ok(())
}
