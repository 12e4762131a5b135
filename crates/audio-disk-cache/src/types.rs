//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A managed audio file found under the storage root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedObject {
    pub path: PathBuf,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
}

/// Snapshot of every managed file, in the order the scan encountered them
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub objects: Vec<CachedObject>,
    pub total_bytes: i64,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvictionReport {
    pub files_deleted: usize,
    pub bytes_freed: i64,
    pub size_before: i64,
    pub size_after: i64,
    /// Files left in place because they were younger than the grace period
    pub skipped_recent: usize,
    pub duration_ms: u64,
}

impl EvictionReport {
    pub fn evicted_anything(&self) -> bool {
        self.files_deleted > 0
    }
}

/// A key resolved to a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAudio {
    pub path: PathBuf,
    pub from_cache: bool,
}

/// Statistics about the loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses that waited on a fetch another request had already started
    pub coalesced: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub in_flight: usize,
}
