//! Digests command implementation.

use super::Target;
use elog_sync_protocol::DigestList;

/// Runs the digests command, printing the list exactly as it goes on the wire.
pub fn run(target: &Target, server: &str) -> Result<(), Box<dyn std::error::Error>> {
    let logbook = target.open()?;
    let list = DigestList::new(server, logbook.digests());
    print!("{}", list.render());
    Ok(())
}
