//! Verify command implementation.

use super::{is_json, CliError, Target};
use elog_core::VerifyReport;

/// Runs the verify command.
pub fn run(target: &Target, rebuild: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let logbook = target.open()?;
    if rebuild {
        logbook.rebuild_index()?;
    }
    let report = logbook.verify()?;

    if is_json(format) {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Verifying logbook {} at {:?}", logbook.name(), logbook.dir().path());
        println!();
        print_report(&report);
        println!();
    }

    if report.is_clean() {
        if !is_json(format) {
            println!("✓ Logbook verification passed");
        }
        Ok(())
    } else {
        if !is_json(format) {
            println!("✗ Logbook verification failed");
        }
        Err(CliError::Failed(format!(
            "verification found {} problem(s)",
            report.problems.len()
        ))
        .into())
    }
}

fn print_report(report: &VerifyReport) {
    println!("  Log files checked: {}", report.files);
    println!("  Records checked:   {}", report.records);
    println!("  Problems:          {}", report.problems.len());

    if !report.problems.is_empty() {
        println!();
        println!("  Problems:");
        for problem in report.problems.iter().take(20) {
            match problem.id {
                Some(id) => println!(
                    "    - {} @ {} (entry {}): {}",
                    problem.file, problem.offset, id, problem.message
                ),
                None => println!(
                    "    - {} @ {}: {}",
                    problem.file, problem.offset, problem.message
                ),
            }
        }
        if report.problems.len() > 20 {
            println!("    ... and {} more", report.problems.len() - 20);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elog_core::{Draft, IndexRegistry, Logbook, LogbookConfig};
    use std::fs;
    use tempfile::TempDir;

    fn populated(temp: &TempDir) -> Target {
        let dir = temp.path().join("Linac");
        let logbook =
            Logbook::open(LogbookConfig::new("Linac", &dir), &IndexRegistry::new()).unwrap();
        logbook.submit(None, Draft::new().body("alpha")).unwrap();
        logbook.submit(None, Draft::new().body("beta")).unwrap();
        Target::new(Some(dir), None)
    }

    #[test]
    fn clean_logbook_passes() {
        let temp = TempDir::new().unwrap();
        let target = populated(&temp);
        run(&target, false, "json").unwrap();
    }

    #[test]
    fn undecodable_record_fails() {
        let temp = TempDir::new().unwrap();
        let target = populated(&temp);
        let logbook = target.open().unwrap();
        let file = logbook.index_entry(2).unwrap().file;
        let path = logbook.dir().file_path(&file);
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(b"$@MID@$: 3\nno separator here\n");
        fs::write(&path, bytes).unwrap();

        let err = run(&target, false, "text").unwrap_err();
        assert!(err.to_string().contains("1 problem"));

        // Rebuilding skips the record again, so it stays unindexed.
        assert!(run(&target, true, "json").is_err());
    }
}
