//! Inventory scan of the storage root

use crate::error::{AudioCacheError, Result};
use crate::types::{CachedObject, Inventory};
use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walk `root` and collect every regular file whose extension is `extension`.
///
/// Symbolic links are never followed or counted, including a root that is
/// itself a link. The walk keeps an explicit stack of pending paths and
/// visits children in file-name order, so the encounter order is
/// deterministic. Any filesystem error aborts the whole scan, except an entry
/// that disappears between listing its directory and reading it.
///
/// This does blocking I/O; async callers should go through
/// `tokio::task::spawn_blocking`.
pub fn scan(root: &Path, extension: &str) -> Result<Inventory> {
    let extension = extension.trim_start_matches('.');
    let mut inventory = Inventory::default();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        let Some(metadata) = unless_vanished(fs::symlink_metadata(&path), &path, root)? else {
            continue;
        };
        let file_type = metadata.file_type();

        if file_type.is_symlink() {
            debug!(path = %path.display(), "Skipping symlink");
            continue;
        }

        if file_type.is_dir() {
            let Some(entries) = unless_vanished(fs::read_dir(&path), &path, root)? else {
                continue;
            };
            let mut children = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| AudioCacheError::scan_failed(&path, e))?;
                children.push(entry.path());
            }
            children.sort();
            // Reversed so the first child is popped first.
            pending.extend(children.into_iter().rev());
            continue;
        }

        if !file_type.is_file() || path.extension() != Some(OsStr::new(extension)) {
            continue;
        }

        let modified = metadata
            .modified()
            .map_err(|e| AudioCacheError::scan_failed(&path, e))?;
        let size_bytes = i64::try_from(metadata.len()).unwrap_or(i64::MAX);

        inventory.total_bytes = inventory.total_bytes.saturating_add(size_bytes);
        inventory.objects.push(CachedObject {
            path,
            size_bytes,
            modified_at: DateTime::<Utc>::from(modified),
        });
    }

    debug!(
        root = %root.display(),
        files = inventory.len(),
        total_bytes = inventory.total_bytes,
        "Inventory scan complete"
    );

    Ok(inventory)
}

/// Treat an entry deleted after its parent was listed as absent.
///
/// yt-dlp creates and removes temp files next to the audio while a fetch
/// runs. Only `NotFound` below the root is forgiven; the root itself and
/// every other error still fail the scan.
fn unless_vanished<T>(result: io::Result<T>, path: &Path, root: &Path) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound && path != root => {
            debug!(path = %path.display(), "Entry removed during scan, skipping");
            Ok(None)
        }
        Err(e) => Err(AudioCacheError::scan_failed(path, e)),
    }
}
