//! Mirror command implementation.

use super::{is_json, CliError, Target};
use elog_sync_engine::{
    DeletionPolicy, HttpTransport, PassOptions, ReqwestClient, SyncConfig, SyncEngine, SyncReport,
};
use elog_sync_protocol::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Flags of the mirror command.
#[derive(Debug, Clone)]
pub struct MirrorArgs {
    /// Base URL of the peer.
    pub peer: String,
    /// Deletion policy name.
    pub deletions: String,
    /// Carry out held-back deletions.
    pub confirm_deletions: bool,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Mirror cache directory.
    pub cache_dir: Option<PathBuf>,
}

/// Runs the mirror command.
pub fn run(
    target: &Target,
    args: MirrorArgs,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = sync_config(target, &args)?;
    debug!(
        logbook = %config.logbook,
        peer = %config.peer_url,
        policy = ?config.deletion_policy,
        "starting mirror pass"
    );
    let logbook = target.open()?;
    let client = ReqwestClient::new(config.timeout)?;
    let transport = HttpTransport::new(config.peer_url.clone(), client);
    let engine = SyncEngine::new(config, logbook, transport);

    let options = PassOptions {
        confirm_deletions: args.confirm_deletions,
    };
    let report = engine.run_pass(options)?;

    if is_json(format) {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::Failed(format!(
            "{} transfer(s) failed and will be retried next pass",
            report.failures.len()
        ))
        .into())
    }
}

fn sync_config(target: &Target, args: &MirrorArgs) -> Result<SyncConfig, CliError> {
    let mut peer = Url::parse(&args.peer).map_err(|_| CliError::InvalidArgument {
        flag: "--peer",
        value: args.peer.clone(),
    })?;
    // Request paths are joined onto the base, which needs a trailing slash.
    if !peer.path().ends_with('/') {
        let path = format!("{}/", peer.path());
        peer.set_path(&path);
    }

    let mut config = SyncConfig::new(target.name()?, peer)
        .with_deletion_policy(parse_policy(&args.deletions)?)
        .with_timeout(Duration::from_secs(args.timeout));
    if let Some(dir) = &args.cache_dir {
        config = config.with_cache_dir(dir);
    }
    Ok(config)
}

fn parse_policy(value: &str) -> Result<DeletionPolicy, CliError> {
    match value.to_ascii_lowercase().as_str() {
        "confirm" => Ok(DeletionPolicy::Confirm),
        "automatic" | "auto" => Ok(DeletionPolicy::Automatic),
        "never" => Ok(DeletionPolicy::Never),
        _ => Err(CliError::InvalidArgument {
            flag: "--deletions",
            value: value.to_string(),
        }),
    }
}

fn print_report(report: &SyncReport) {
    println!("Mirror pass {} <-> {}", report.logbook, report.peer);
    println!("  Converged: {}", report.converged);
    println!("  Pushed:    {}", join(&report.pushed));
    println!("  Pulled:    {}", join(&report.pulled));
    for moved in &report.renumbered {
        println!("  Renumbered local entry {} to {}", moved.from, moved.to);
    }
    for deletion in &report.deletions {
        println!("  Deleted {} on {:?} side", deletion.id, deletion.side);
    }
    if !report.pending_deletions.is_empty() {
        println!();
        println!("Deletions waiting for --confirm-deletions:");
        for deletion in &report.pending_deletions {
            println!("  entry {} on {:?} side", deletion.id, deletion.side);
        }
    }
    if !report.conflicts.is_empty() {
        println!();
        println!("Conflicts (resolve by hand):");
        for conflict in &report.conflicts {
            println!(
                "  entry {}: local {} / remote {}",
                conflict.id, conflict.local_location, conflict.remote_location
            );
        }
    }
    if !report.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &report.failures {
            println!("  entry {} ({:?}): {}", failure.id, failure.operation, failure.reason);
        }
    }
    println!();
    println!("Done in {:.2}s", report.duration.as_secs_f64());
}

fn join(ids: &[u32]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(peer: &str, deletions: &str) -> MirrorArgs {
        MirrorArgs {
            peer: peer.to_string(),
            deletions: deletions.to_string(),
            confirm_deletions: false,
            timeout: 5,
            cache_dir: None,
        }
    }

    #[test]
    fn config_from_flags() {
        let target = Target::new(Some(PathBuf::from("/data/Linac")), None);
        let config = sync_config(&target, &args("http://peer:8080/elog", "never")).unwrap();
        assert_eq!(config.logbook, "Linac");
        assert_eq!(config.peer_url.as_str(), "http://peer:8080/elog/");
        assert_eq!(config.deletion_policy, DeletionPolicy::Never);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_flags_are_rejected() {
        let target = Target::new(Some(PathBuf::from("/data/Linac")), None);
        assert!(matches!(
            sync_config(&target, &args("not a url", "confirm")),
            Err(CliError::InvalidArgument { flag: "--peer", .. })
        ));
        assert!(matches!(
            sync_config(&target, &args("http://peer/", "sometimes")),
            Err(CliError::InvalidArgument { flag: "--deletions", .. })
        ));
    }
}
