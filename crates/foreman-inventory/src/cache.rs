//! On-disk cache: host-detail file and inventory index file

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{InventoryError, Result};
use crate::types::Snapshot;

/// Locations of the two cache files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    /// Raw host records keyed by name (`<program>.cache`)
    pub cache_file: PathBuf,
    /// Grouped inventory (`<program>.index`)
    pub index_file: PathBuf,
}

impl CacheStore {
    /// Cache files for `program` inside `dir`
    pub fn new(dir: impl AsRef<Path>, program: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            cache_file: dir.join(format!("{program}.cache")),
            index_file: dir.join(format!("{program}.index")),
        }
    }

    /// Check whether the cache may be used instead of calling Foreman
    #[must_use]
    pub fn is_valid(&self, max_age: Duration) -> bool {
        self.is_valid_at(max_age, Utc::now())
    }

    /// Check freshness against an explicit clock
    ///
    /// Valid iff the detail cache was modified less than `max_age` before
    /// `now` and the index file exists.
    #[must_use]
    pub fn is_valid_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let Some(modified) = self.modified() else {
            debug!(path = %self.cache_file.display(), "no host cache");
            return false;
        };

        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return self.index_file.is_file();
        };
        let expires = modified.checked_add_signed(max_age);
        let fresh = expires.is_none_or(|expires| expires > now);

        debug!(%modified, ?expires, fresh, "host cache age check");
        fresh && self.index_file.is_file()
    }

    /// Modification time of the detail cache
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        if !self.cache_file.is_file() {
            return None;
        }
        std::fs::metadata(&self.cache_file)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Load both files
    ///
    /// # Errors
    /// Returns an error if either file is missing or does not parse.
    #[instrument(skip(self))]
    pub fn load(&self) -> Result<Snapshot> {
        let inventory = read_json(&self.index_file)?;
        let hosts = read_json(&self.cache_file)?;
        Ok(Snapshot { inventory, hosts })
    }

    /// Write both files
    ///
    /// # Errors
    /// Returns an error if the directory or either file cannot be written.
    #[instrument(skip(self, snapshot), fields(hosts = snapshot.hosts.len()))]
    pub fn store(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = self.cache_file.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| InventoryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        write_json(&self.cache_file, &snapshot.hosts)?;
        write_json(&self.index_file, &snapshot.inventory)?;
        debug!("cache written");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| InventoryError::CorruptCache {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}
