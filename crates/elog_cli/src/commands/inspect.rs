//! Inspect command implementation.

use super::{is_json, Target};
use elog_core::{IndexEntry, Logbook, MessageId};
use serde::Serialize;

/// Logbook inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Logbook name.
    pub name: String,
    /// Data directory.
    pub path: String,
    /// Number of indexed entries.
    pub entry_count: usize,
    /// Entries starting a thread.
    pub head_count: usize,
    /// Id of the oldest entry.
    pub first_id: Option<MessageId>,
    /// Highest id.
    pub max_id: Option<MessageId>,
    /// Total size of all log files in bytes.
    pub total_size: u64,
    /// Per-file statistics.
    pub files: Vec<FileStats>,
    /// Index entries (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<IndexEntry>>,
}

/// Statistics for a single log file.
#[derive(Debug, Serialize)]
pub struct FileStats {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Number of indexed records.
    pub records: usize,
}

/// Runs the inspect command.
pub fn run(
    target: &Target,
    show_entries: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let logbook = target.open()?;
    let result = inspect(&logbook, show_entries)?;

    if is_json(format) {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text_output(&result);
    }

    Ok(())
}

/// Gathers the statistics of an open logbook.
pub fn inspect(
    logbook: &Logbook,
    show_entries: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let index = logbook.index_entries();
    let mut files = Vec::new();
    for name in logbook.dir().list_log_files()? {
        files.push(FileStats {
            size: logbook.dir().file_len(&name)?,
            records: index.iter().filter(|e| e.file == name).count(),
            name,
        });
    }

    Ok(InspectResult {
        name: logbook.name().to_string(),
        path: logbook.dir().path().display().to_string(),
        entry_count: index.len(),
        head_count: index.iter().filter(|e| e.is_head()).count(),
        first_id: logbook.first(false),
        max_id: logbook.max_id(),
        total_size: files.iter().map(|f| f.size).sum(),
        files,
        entries: show_entries.then_some(index),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("elog Logbook Inspection");
    println!("=======================");
    println!();
    println!("Logbook: {}", result.name);
    println!("Path:    {}", result.path);
    println!();
    println!("Entries:");
    println!("  Indexed:       {}", result.entry_count);
    println!("  Thread heads:  {}", result.head_count);
    if let (Some(first), Some(max)) = (result.first_id, result.max_id) {
        println!("  Oldest entry:  {first}");
        println!("  Highest id:    {max}");
    }
    println!();
    println!("Log files ({}, {}):", result.files.len(), format_size(result.total_size));
    for file in &result.files {
        println!(
            "  {}  {:>10}  {} records",
            file.name,
            format_size(file.size),
            file.records
        );
    }

    if let Some(entries) = &result.entries {
        println!();
        println!("Index:");
        for entry in entries {
            let parent = entry
                .parent
                .map(|p| format!(" reply to {p}"))
                .unwrap_or_default();
            println!(
                "  {:>6}  {} @ {:<8} {:>6} bytes  {}{}",
                entry.id, entry.file, entry.offset, entry.len, entry.digest, parent
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
