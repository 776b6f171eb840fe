//! Process-wide registry of shared indexes.
//!
//! Two logbooks configured with the same data directory must see each
//! other's writes immediately. The registry hands both the same
//! [`SharedStore`], keyed by the canonical directory path.

use crate::error::CoreResult;
use crate::index::Index;
use crate::logdir::LogDir;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// A data directory together with its index.
///
/// Mutations hold the index write lock for their whole duration, covering
/// both the file operation and the index update. Reads hold the read lock.
#[derive(Debug)]
pub struct SharedStore {
    dir: LogDir,
    index: RwLock<Index>,
}

impl SharedStore {
    /// Opens a data directory and builds its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or scanned.
    pub fn open(path: &Path, create_if_missing: bool, sync_writes: bool) -> CoreResult<Self> {
        let dir = LogDir::open(path, create_if_missing, sync_writes)?;
        let index = Index::build(&dir)?;
        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn dir(&self) -> &LogDir {
        &self.dir
    }

    /// Acquires the index for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read()
    }

    /// Acquires the index for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write()
    }

    /// Replaces `index` with a fresh scan of the directory.
    ///
    /// Takes the guard the caller already holds, so a rebuild never races
    /// with a mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails; `index` is left untouched then.
    pub fn rebuild(&self, index: &mut Index) -> CoreResult<()> {
        warn!(dir = %self.dir.path().display(), "rebuilding index");
        *index = Index::build(&self.dir)?;
        Ok(())
    }
}

/// Maps canonical data directories to their shared stores.
///
/// The registry holds stores weakly: once the last logbook on a directory
/// is dropped its index is freed, and the entry is pruned on the next
/// `open`.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    stores: Mutex<HashMap<PathBuf, Weak<SharedStore>>>,
}

impl IndexRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `path`, opening and indexing it on first use.
    ///
    /// Later calls for the same directory, under any spelling of its path,
    /// return the same store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened, canonicalised or
    /// scanned.
    pub fn open(
        &self,
        path: &Path,
        create_if_missing: bool,
        sync_writes: bool,
    ) -> CoreResult<Arc<SharedStore>> {
        if create_if_missing && !path.exists() {
            fs::create_dir_all(path)?;
        }
        let key = path.canonicalize()?;

        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&key).and_then(Weak::upgrade) {
            debug!(dir = %key.display(), "sharing existing index");
            return Ok(store);
        }
        stores.retain(|_, store| store.strong_count() > 0);

        let store = Arc::new(SharedStore::open(&key, create_if_missing, sync_writes)?);
        stores.insert(key, Arc::downgrade(&store));
        Ok(store)
    }

    /// Returns the number of directories with a live store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores
            .lock()
            .values()
            .filter(|store| store.strong_count() > 0)
            .count()
    }

    /// Returns true if no directory has a live store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the registry's reference to `path`'s store.
    ///
    /// Logbooks still holding the store keep working; the next `open`
    /// rebuilds from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be canonicalised.
    pub fn forget(&self, path: &Path) -> CoreResult<bool> {
        let key = path.canonicalize()?;
        Ok(self.stores.lock().remove(&key).is_some())
    }
}
