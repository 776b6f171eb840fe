//! elog CLI
//!
//! Command-line tools for elog logbook maintenance.
//!
//! # Commands
//!
//! - `inspect` - Display log files and index statistics
//! - `verify` - Re-hash every record and compare it with the index
//! - `show` - Print one entry
//! - `digests` - Print the digest list a mirror peer would receive
//! - `delete` - Delete an entry
//! - `renumber` - Move an entry to a new id
//! - `mirror` - Run one mirror pass against a peer

mod commands;

use clap::{Parser, Subcommand};
use elog_codec::MessageId;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// elog command-line logbook tools.
#[derive(Parser)]
#[command(name = "elog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the logbook data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Logbook name (defaults to the directory name)
    #[arg(global = true, short, long)]
    logbook: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display log files and index statistics
    Inspect {
        /// List every index entry
        #[arg(short, long)]
        entries: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Re-hash every record and compare it with the index
    Verify {
        /// Rebuild the index from the log files before verifying
        #[arg(short, long)]
        rebuild: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one entry
    Show {
        /// Entry id
        id: MessageId,

        /// Print the stored record bytes unchanged
        #[arg(short, long)]
        raw: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the digest list a mirror peer would receive
    Digests {
        /// Server name for the banner line
        #[arg(short, long, default_value = "elog")]
        server: String,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: MessageId,

        /// Keep replies instead of deleting them recursively
        #[arg(long)]
        keep_replies: bool,

        /// Keep attachment files
        #[arg(long)]
        keep_attachments: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Move an entry to a new id
    Renumber {
        /// Current id
        old: MessageId,

        /// New, unused id
        new: MessageId,
    },

    /// Run one mirror pass against a peer
    Mirror {
        /// Base URL of the peer server
        #[arg(long)]
        peer: String,

        /// Deletion policy (confirm, automatic, never)
        #[arg(short, long, default_value = "confirm")]
        deletions: String,

        /// Carry out deletions the confirm policy is holding back
        #[arg(long)]
        confirm_deletions: bool,

        /// Request timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,

        /// Directory for the mirror cache file
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let target = commands::Target::new(cli.path, cli.logbook);

    match cli.command {
        Commands::Inspect { entries, format } => {
            commands::inspect::run(&target, entries, &format)?;
        }
        Commands::Verify { rebuild, format } => {
            commands::verify::run(&target, rebuild, &format)?;
        }
        Commands::Show { id, raw, format } => {
            commands::show::run(&target, id, raw, &format)?;
        }
        Commands::Digests { server } => {
            commands::digests::run(&target, &server)?;
        }
        Commands::Delete {
            id,
            keep_replies,
            keep_attachments,
            format,
        } => {
            commands::delete::run(&target, id, !keep_replies, !keep_attachments, &format)?;
        }
        Commands::Renumber { old, new } => {
            commands::renumber::run(&target, old, new)?;
        }
        Commands::Mirror {
            peer,
            deletions,
            confirm_deletions,
            timeout,
            cache_dir,
            format,
        } => {
            let options = commands::mirror::MirrorArgs {
                peer,
                deletions,
                confirm_deletions,
                timeout,
                cache_dir,
            };
            commands::mirror::run(&target, options, &format)?;
        }
        Commands::Version => {
            println!("elog CLI v{}", env!("CARGO_PKG_VERSION"));
            let (major, minor) = elog_sync_protocol::PROTOCOL_VERSION;
            println!("Mirror protocol v{major}.{minor}");
        }
    }

    Ok(())
}
