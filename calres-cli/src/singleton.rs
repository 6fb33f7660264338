//! Ensures only one calres run updates a cache database at a time.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

/// A lock guard that releases the lock when dropped
pub struct LockGuard {
    _file: File,
}

fn lock_path(database: &Path) -> PathBuf {
    database.with_extension("lock")
}

/// Acquire an exclusive lock on the database, failing if another run holds it
pub fn acquire_lock(database: &Path) -> Result<LockGuard> {
    let path = lock_path(database);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(&path).context("Failed to create lock file")?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another calres run is already updating {}.\n\
            If you believe this is an error, remove: {}",
            database.display(),
            path.display()
        )
    })?;

    Ok(LockGuard { _file: file })
}
