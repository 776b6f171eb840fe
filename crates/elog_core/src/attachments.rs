//! Attachment storage.
//!
//! Entries reference attachments by stored file name only. The bytes live
//! behind an [`AttachmentStore`], which by default is a plain directory next
//! to the log files.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage for attachment bytes, addressed by stored file name.
pub trait AttachmentStore: Send + Sync {
    /// Stores `data` under `name`, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the write fails.
    fn put(&self, name: &str, data: &[u8]) -> CoreResult<()>;

    /// Reads the attachment stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AttachmentNotFound`] if nothing is stored under
    /// `name`.
    fn get(&self, name: &str) -> CoreResult<Vec<u8>>;

    /// Deletes the attachment. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the removal fails.
    fn delete(&self, name: &str) -> CoreResult<bool>;

    /// Returns true if an attachment is stored under `name`.
    fn exists(&self, name: &str) -> bool;
}

/// Returns the stored name for an attachment uploaded with an entry dated
/// `date`: `YYMMDD_hhmmss_<original>`.
///
/// Any directory part of `original` is dropped.
#[must_use]
pub fn attachment_file_name(date: &DateTime<FixedOffset>, original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .replace(',', "_");
    format!("{}_{base}", date.format("%y%m%d_%H%M%S"))
}

fn check_name(name: &str) -> CoreResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\n', '\r', '\0'])
    {
        return Err(CoreError::invalid_operation(format!(
            "invalid attachment name {name:?}"
        )));
    }
    Ok(())
}

/// Attachments kept as files in one directory.
#[derive(Debug, Clone)]
pub struct DirAttachmentStore {
    dir: PathBuf,
}

impl DirAttachmentStore {
    /// Creates a store over `dir`. The directory is created on first `put`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl AttachmentStore for DirAttachmentStore {
    fn put(&self, name: &str, data: &[u8]) -> CoreResult<()> {
        check_name(name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(name), data)?;
        Ok(())
    }

    fn get(&self, name: &str) -> CoreResult<Vec<u8>> {
        check_name(name)?;
        match fs::read(self.dir.join(name)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CoreError::AttachmentNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, name: &str) -> CoreResult<bool> {
        check_name(name)?;
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.dir.join(name).is_file()
    }
}

/// In-memory attachment store for tests.
#[derive(Debug, Default)]
pub struct MemoryAttachmentStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAttachmentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored attachments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl AttachmentStore for MemoryAttachmentStore {
    fn put(&self, name: &str, data: &[u8]) -> CoreResult<()> {
        check_name(name)?;
        self.files.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> CoreResult<Vec<u8>> {
        self.files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::AttachmentNotFound {
                name: name.to_string(),
            })
    }

    fn delete(&self, name: &str) -> CoreResult<bool> {
        Ok(self.files.write().remove(name).is_some())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }
}
