//! Log directory management.
//!
//! A logbook's data directory holds one file per calendar day:
//!
//! ```text
//! <data_dir>/
//! ├─ 240130a.log       # entries dated 2024-01-30
//! ├─ 240131a.log
//! └─ 240131_140500_plot.png   # attachment (see `attachments`)
//! ```
//!
//! Records inside a file are concatenated with no gaps. Every
//! length-changing write goes through [`LogDir::splice`].

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, FixedOffset, NaiveDate};
use elog_storage::{FileBackend, SpliceOutcome, StorageBackend, StorageError};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of every log file.
const LOG_SUFFIX: &str = ".log";

/// Handle on one data directory.
///
/// `LogDir` holds no open files; each operation opens the file it needs.
/// Callers serialise mutations (the index write lock does this).
#[derive(Debug, Clone)]
pub struct LogDir {
    path: PathBuf,
    sync_writes: bool,
}

impl LogDir {
    /// Opens a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory doesn't exist and
    /// `create_if_missing` is false, or if it cannot be created.
    pub fn open(path: &Path, create_if_missing: bool, sync_writes: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "logbook directory {} does not exist",
                    path.display()
                )));
            }
        } else if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            sync_writes,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of a log file in this directory.
    #[must_use]
    pub fn file_path(&self, file: &str) -> PathBuf {
        self.path.join(file)
    }

    /// Returns the log file name for entries dated `date`: `YYMMDDa.log`.
    #[must_use]
    pub fn file_name_for(date: &DateTime<FixedOffset>) -> String {
        format!("{}a{LOG_SUFFIX}", date.format("%y%m%d"))
    }

    /// Returns true if `name` matches `^\d{6}[a-z]?\.log$`.
    #[must_use]
    pub fn is_log_file_name(name: &str) -> bool {
        let Some(stem) = name.strip_suffix(LOG_SUFFIX) else {
            return false;
        };
        let bytes = stem.as_bytes();
        match bytes.len() {
            6 => bytes.iter().all(u8::is_ascii_digit),
            7 => bytes[..6].iter().all(u8::is_ascii_digit) && bytes[6].is_ascii_lowercase(),
            _ => false,
        }
    }

    /// Returns the calendar day a log file name stands for.
    #[must_use]
    pub fn file_date(name: &str) -> Option<NaiveDate> {
        if !Self::is_log_file_name(name) {
            return None;
        }
        NaiveDate::parse_from_str(&name[..6], "%y%m%d").ok()
    }

    /// Lists the log files in the directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_log_files(&self) -> CoreResult<Vec<String>> {
        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&self.path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = dir_entry.file_name().to_str() {
                if Self::is_log_file_name(name) {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Appends `bytes` to `file`, creating it if needed.
    ///
    /// Returns the offset the bytes were written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn append(&self, file: &str, bytes: &[u8]) -> CoreResult<u64> {
        let mut backend = FileBackend::open(&self.file_path(file))?;
        let offset = backend.append(bytes)?;
        if self.sync_writes {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        debug!(file, offset, len = bytes.len(), "appended record");
        Ok(offset)
    }

    /// Replaces `range` of `file` with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, the range is out of
    /// bounds, or any write fails.
    pub fn splice(&self, file: &str, range: Range<u64>, bytes: &[u8]) -> CoreResult<SpliceOutcome> {
        let mut backend = FileBackend::open_existing(&self.file_path(file))?;
        let (start, end) = (range.start, range.end);
        let outcome = backend.splice(range, bytes)?;
        debug!(file, start, end, delta = outcome.delta, "spliced record");
        Ok(outcome)
    }

    /// Reads up to `max_len` bytes of `file` from `offset`.
    ///
    /// The result is short when the file ends first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or `offset` lies past its
    /// end.
    pub fn read(&self, file: &str, offset: u64, max_len: usize) -> CoreResult<Vec<u8>> {
        let backend = FileBackend::open_existing(&self.file_path(file))?;
        let size = backend.size()?;
        if offset > size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: max_len,
                size,
            }
            .into());
        }
        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        Ok(backend.read_at(offset, max_len.min(available))?)
    }

    /// Reads a whole log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or cannot be read.
    pub fn read_all(&self, file: &str) -> CoreResult<Vec<u8>> {
        let backend = FileBackend::open_existing(&self.file_path(file))?;
        Ok(backend.read_all()?)
    }

    /// Returns the length of `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist.
    pub fn file_len(&self, file: &str) -> CoreResult<u64> {
        Ok(fs::metadata(self.file_path(file))?.len())
    }

    /// Removes `file` if it is empty. Returns true if it was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be inspected or removed.
    pub fn remove_if_empty(&self, file: &str) -> CoreResult<bool> {
        let path = self.file_path(file);
        match fs::metadata(&path) {
            Ok(meta) if meta.len() == 0 => {
                fs::remove_file(&path)?;
                debug!(file, "removed empty log file");
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_dir() -> (TempDir, LogDir) {
        let temp = TempDir::new().unwrap();
        let dir = LogDir::open(temp.path(), false, false).unwrap();
        (temp, dir)
    }

    #[test]
    fn file_names() {
        let date = DateTime::parse_from_rfc2822("Wed, 31 Jan 2024 14:05:00 +0100").unwrap();
        assert_eq!(LogDir::file_name_for(&date), "240131a.log");

        assert!(LogDir::is_log_file_name("240131a.log"));
        assert!(LogDir::is_log_file_name("240131.log"));
        assert!(!LogDir::is_log_file_name("240131A.log"));
        assert!(!LogDir::is_log_file_name("240131ab.log"));
        assert!(!LogDir::is_log_file_name("2401311.log"));
        assert!(!LogDir::is_log_file_name("240131a.txt"));
        assert!(!LogDir::is_log_file_name("mirror.cache"));

        assert_eq!(
            LogDir::file_date("240131a.log"),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert_eq!(LogDir::file_date("241399a.log"), None);
    }

    #[test]
    fn missing_dir_without_create() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(LogDir::open(&missing, false, false).is_err());
        assert!(LogDir::open(&missing, true, false).is_ok());
        assert!(missing.is_dir());
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let (temp, dir) = open_dir();
        for name in ["240201a.log", "240131a.log", "notes.txt", "240131_140500_a.png"] {
            fs::write(temp.path().join(name), b"").unwrap();
        }
        fs::create_dir(temp.path().join("240101a.log")).unwrap();

        assert_eq!(dir.list_log_files().unwrap(), ["240131a.log", "240201a.log"]);
    }

    #[test]
    fn append_read_splice() {
        let (_temp, dir) = open_dir();
        assert_eq!(dir.append("240131a.log", b"first\n").unwrap(), 0);
        assert_eq!(dir.append("240131a.log", b"second\n").unwrap(), 6);

        assert_eq!(dir.read("240131a.log", 6, 100).unwrap(), b"second\n");
        assert_eq!(dir.read("240131a.log", 13, 5).unwrap(), b"");
        assert!(dir.read("240131a.log", 14, 5).is_err());

        let outcome = dir.splice("240131a.log", 0..6, b"1st\n").unwrap();
        assert_eq!(outcome.delta, -2);
        assert_eq!(dir.read_all("240131a.log").unwrap(), b"1st\nsecond\n");
        assert_eq!(dir.file_len("240131a.log").unwrap(), 11);
    }

    #[test]
    fn read_missing_file_does_not_create_it() {
        let (temp, dir) = open_dir();
        let err = dir.read("240131a.log", 0, 10).unwrap_err();
        assert!(err.is_missing_file());
        assert!(!temp.path().join("240131a.log").exists());
    }

    #[test]
    fn remove_only_empty_files() {
        let (temp, dir) = open_dir();
        dir.append("240131a.log", b"x").unwrap();
        assert!(!dir.remove_if_empty("240131a.log").unwrap());

        dir.splice("240131a.log", 0..1, b"").unwrap();
        assert!(dir.remove_if_empty("240131a.log").unwrap());
        assert!(!temp.path().join("240131a.log").exists());
        assert!(!dir.remove_if_empty("240131a.log").unwrap());
    }
}
