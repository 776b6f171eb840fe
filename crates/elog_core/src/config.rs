//! Logbook configuration.

use elog_codec::AttributeSchema;
use std::path::{Path, PathBuf};

/// Configuration for opening a logbook.
///
/// The INI layer that normally produces these values lives outside this
/// crate; a `LogbookConfig` is built in code or from command-line flags.
#[derive(Debug, Clone)]
pub struct LogbookConfig {
    /// Logbook name, as used in mirror requests and cache file names.
    pub name: String,

    /// Directory holding the `YYMMDDa.log` files.
    ///
    /// Logbooks configured with the same directory share one index.
    pub data_dir: PathBuf,

    /// Attribute names and their order.
    pub schema: AttributeSchema,

    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync after every append (safer but slower).
    ///
    /// Splices always sync, regardless of this setting.
    pub sync_writes: bool,

    /// Directory for attachment files. Defaults to the data directory.
    pub attachment_dir: Option<PathBuf>,
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            data_dir: PathBuf::from("logbooks/default"),
            schema: AttributeSchema::permissive(),
            create_if_missing: true,
            sync_writes: true,
            attachment_dir: None,
        }
    }
}

impl LogbookConfig {
    /// Creates a configuration for the named logbook stored in `data_dir`.
    #[must_use]
    pub fn new(name: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the attribute schema.
    #[must_use]
    pub fn schema(mut self, schema: AttributeSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync after every append.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets the attachment directory.
    #[must_use]
    pub fn attachment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachment_dir = Some(dir.into());
        self
    }

    /// Returns the directory attachments are stored in.
    #[must_use]
    pub fn attachment_path(&self) -> &Path {
        self.attachment_dir.as_deref().unwrap_or(&self.data_dir)
    }
}
