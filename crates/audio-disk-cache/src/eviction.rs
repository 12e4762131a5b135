//! Size-budget eviction of cached audio files
//!
//! One pass scans the storage root and, if the managed files add up to more
//! than the budget, deletes them oldest-first (by mtime) until the recorded
//! total is back under the budget. Files younger than the grace period are
//! never deleted, which keeps a pass from removing a file a fetch is still
//! writing.

use crate::error::{AudioCacheError, Result};
use crate::inventory::scan;
use crate::types::{EvictionReport, Inventory};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default minimum age before a file may be evicted (10 minutes)
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Eviction settings for one storage root
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    root: PathBuf,
    extension: String,
    budget_bytes: i64,
    grace_period: Duration,
}

impl EvictionPolicy {
    /// Create a policy with the default grace period
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>, budget_bytes: i64) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            budget_bytes,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Set the minimum file age for eviction. Zero disables the check.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn budget_bytes(&self) -> i64 {
        self.budget_bytes
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one eviction pass.
    ///
    /// A failed delete stops the pass; files not yet reached stay on disk
    /// until the next pass.
    pub fn enforce(&self) -> Result<EvictionReport> {
        let start = Instant::now();
        let inventory = scan(&self.root, &self.extension)?;
        self.evict(inventory, start)
    }

    /// Delete from an already-scanned inventory until it fits the budget
    fn evict(&self, inventory: Inventory, start: Instant) -> Result<EvictionReport> {
        let size_before = inventory.total_bytes;

        if size_before <= self.budget_bytes {
            debug!(
                size_bytes = size_before,
                budget_bytes = self.budget_bytes,
                "Audio storage under budget, no eviction needed"
            );
            return Ok(EvictionReport {
                size_before,
                size_after: size_before,
                duration_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            });
        }

        info!(
            size_bytes = size_before,
            budget_bytes = self.budget_bytes,
            file_count = inventory.len(),
            "Audio storage over budget, evicting oldest files"
        );

        let mut objects = inventory.objects;
        // Stable: files with equal mtimes keep their scan order.
        objects.sort_by_key(|o| o.modified_at);

        let now = Utc::now();
        let grace = chrono::Duration::from_std(self.grace_period).unwrap_or(chrono::Duration::MAX);
        let mut report = EvictionReport {
            size_before,
            ..Default::default()
        };
        let mut remaining = size_before;

        for object in objects {
            if remaining <= self.budget_bytes {
                break;
            }

            if now - object.modified_at < grace {
                report.skipped_recent += 1;
                continue;
            }

            fs::remove_file(&object.path)
                .map_err(|e| AudioCacheError::delete_failed(&object.path, e))?;
            remaining -= object.size_bytes;
            report.files_deleted += 1;
            report.bytes_freed += object.size_bytes;

            debug!(
                path = %object.path.display(),
                size_bytes = object.size_bytes,
                remaining_bytes = remaining,
                "Evicted audio file"
            );
        }

        report.size_after = remaining;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            files_deleted = report.files_deleted,
            bytes_freed = report.bytes_freed,
            size_bytes = report.size_after,
            skipped_recent = report.skipped_recent,
            "Evicted excess audio files"
        );

        Ok(report)
    }

    /// Run [`EvictionPolicy::enforce`] on the blocking thread pool
    pub async fn enforce_async(&self) -> Result<EvictionReport> {
        let policy = self.clone();
        tokio::task::spawn_blocking(move || policy.enforce())
            .await
            .map_err(|e| AudioCacheError::from(std::io::Error::other(e)))?
    }
}

/// Run one eviction pass over `root` with no grace period
pub fn enforce(
    root: impl Into<PathBuf>,
    extension: &str,
    budget_bytes: i64,
) -> Result<EvictionReport> {
    EvictionPolicy::new(root, extension, budget_bytes)
        .with_grace_period(Duration::ZERO)
        .enforce()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{create_audio_file, hours_ago};
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn populate(dir: &Path, files: &[(&str, usize, SystemTime)]) {
        for (name, size, modified) in files {
            create_audio_file(&dir.join(name), *size, *modified);
        }
    }

    fn remaining(dir: &Path) -> (Vec<String>, i64) {
        let inventory = scan(dir, "m4a").unwrap();
        let mut names: Vec<String> = inventory
            .objects
            .iter()
            .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        (names, inventory.total_bytes)
    }

    #[test]
    fn test_evicts_oldest_when_over_budget() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("oldest.m4a", 200, hours_ago(3)),
                ("middle.m4a", 200, hours_ago(2)),
                ("newest.m4a", 200, hours_ago(1)),
            ],
        );

        let report = enforce(dir.path(), "m4a", 500).unwrap();
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.bytes_freed, 200);
        assert_eq!(report.size_after, 400);

        let (names, total) = remaining(dir.path());
        assert_eq!(names, vec!["middle.m4a", "newest.m4a"]);
        assert_eq!(total, 400);
    }

    #[test]
    fn test_keeps_everything_under_budget() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("test1.m4a", 200, hours_ago(1)),
                ("test2.m4a", 200, hours_ago(2)),
                ("test3.m4a", 99, hours_ago(3)),
            ],
        );

        let report = enforce(dir.path(), "m4a", 500).unwrap();
        assert!(!report.evicted_anything());
        assert_eq!(report.size_before, 499);

        let (names, total) = remaining(dir.path());
        assert_eq!(names, vec!["test1.m4a", "test2.m4a", "test3.m4a"]);
        assert_eq!(total, 499);
    }

    #[test]
    fn test_evicts_multiple_files() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("file1.m4a", 200, hours_ago(5)),
                ("file2.m4a", 200, hours_ago(4)),
                ("file3.m4a", 200, hours_ago(3)),
                ("file4.m4a", 200, hours_ago(2)),
                ("file5.m4a", 200, hours_ago(1)),
            ],
        );

        let report = enforce(dir.path(), "m4a", 400).unwrap();
        assert_eq!(report.files_deleted, 3);

        let (names, total) = remaining(dir.path());
        assert_eq!(names, vec!["file4.m4a", "file5.m4a"]);
        assert_eq!(total, 400);
    }

    #[test]
    fn test_mixed_sizes() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("big.m4a", 300, hours_ago(3)),
                ("medium.m4a", 150, hours_ago(2)),
                ("small.m4a", 50, hours_ago(1)),
            ],
        );

        enforce(dir.path(), "m4a", 200).unwrap();

        let (names, total) = remaining(dir.path());
        assert_eq!(names, vec!["medium.m4a", "small.m4a"]);
        assert_eq!(total, 200);
    }

    #[test]
    fn test_equal_mtimes_evict_in_scan_order() {
        let dir = tempdir().unwrap();
        let tied = hours_ago(3);
        populate(
            dir.path(),
            &[
                ("b.m4a", 200, tied),
                ("a.m4a", 200, tied),
                ("c.m4a", 200, hours_ago(1)),
            ],
        );

        let report = enforce(dir.path(), "m4a", 400).unwrap();
        assert_eq!(report.files_deleted, 1);

        let (names, _) = remaining(dir.path());
        assert_eq!(names, vec!["b.m4a", "c.m4a"]);
    }

    #[test]
    fn test_failed_delete_stops_the_pass() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("a.m4a", 100, hours_ago(4)),
                ("b.m4a", 100, hours_ago(3)),
                ("c.m4a", 100, hours_ago(2)),
                ("d.m4a", 100, hours_ago(1)),
            ],
        );
        let policy = EvictionPolicy::new(dir.path(), "m4a", 150).with_grace_period(Duration::ZERO);
        let inventory = scan(dir.path(), "m4a").unwrap();

        // Gone between the scan and the delete
        fs::remove_file(dir.path().join("b.m4a")).unwrap();

        let result = policy.evict(inventory, Instant::now());
        match result {
            Err(AudioCacheError::DeleteFailed { path, .. }) => {
                assert_eq!(path, dir.path().join("b.m4a"));
            }
            other => panic!("expected DeleteFailed, got {:?}", other),
        }

        assert!(!dir.path().join("a.m4a").exists());
        assert!(dir.path().join("c.m4a").exists());
        assert!(dir.path().join("d.m4a").exists());
    }

    #[test]
    fn test_second_pass_deletes_nothing() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("a.m4a", 300, hours_ago(4)),
                ("b.m4a", 300, hours_ago(3)),
                ("c.m4a", 300, hours_ago(2)),
            ],
        );

        let first = enforce(dir.path(), "m4a", 500).unwrap();
        assert_eq!(first.files_deleted, 2);

        let second = enforce(dir.path(), "m4a", 500).unwrap();
        assert_eq!(second.files_deleted, 0);
        assert_eq!(second.size_before, first.size_after);
    }

    #[test]
    fn test_survivors_are_never_older_than_evicted() {
        let dir = tempdir().unwrap();
        let ages = [7u64, 2, 9, 1, 5, 3, 8];
        for (i, age) in ages.iter().enumerate() {
            create_audio_file(
                &dir.path().join(format!("f{}.m4a", i)),
                100 + i * 10,
                hours_ago(*age),
            );
        }
        let before = scan(dir.path(), "m4a").unwrap();

        enforce(dir.path(), "m4a", 350).unwrap();

        let after = scan(dir.path(), "m4a").unwrap();
        assert!(after.total_bytes <= 350);

        let evicted: Vec<_> = before
            .objects
            .iter()
            .filter(|o| !after.objects.iter().any(|a| a.path == o.path))
            .collect();
        assert!(!evicted.is_empty());
        for gone in &evicted {
            for kept in &after.objects {
                assert!(gone.modified_at <= kept.modified_at);
            }
        }
    }

    #[test]
    fn test_budget_smaller_than_any_file_deletes_everything() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("a.m4a", 300, hours_ago(2)),
                ("b.m4a", 300, hours_ago(1)),
            ],
        );

        let report = enforce(dir.path(), "m4a", 100).unwrap();
        assert_eq!(report.files_deleted, 2);
        assert_eq!(remaining(dir.path()).1, 0);
    }

    #[test]
    fn test_other_extensions_are_untouched() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("old.webm", 10_000, hours_ago(10)),
                ("a.m4a", 300, hours_ago(2)),
                ("b.m4a", 300, hours_ago(1)),
            ],
        );

        enforce(dir.path(), "m4a", 300).unwrap();

        assert!(dir.path().join("old.webm").exists());
        assert!(!dir.path().join("a.m4a").exists());
        assert!(dir.path().join("b.m4a").exists());
    }

    #[test]
    fn test_grace_period_protects_recent_files() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("old.m4a", 200, hours_ago(3)),
                ("fresh1.m4a", 200, SystemTime::now()),
                ("fresh2.m4a", 200, SystemTime::now()),
            ],
        );

        let report = EvictionPolicy::new(dir.path(), "m4a", 100)
            .with_grace_period(Duration::from_secs(60))
            .enforce()
            .unwrap();

        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.skipped_recent, 2);
        assert_eq!(report.size_after, 400);
        let (names, _) = remaining(dir.path());
        assert_eq!(names, vec!["fresh1.m4a", "fresh2.m4a"]);
    }

    #[test]
    fn test_missing_root_is_scan_failure() {
        let dir = tempdir().unwrap();
        let result = enforce(dir.path().join("gone"), "m4a", 0);
        assert!(matches!(result, Err(AudioCacheError::ScanFailed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_never_deleted() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        create_audio_file(&outside.path().join("target.m4a"), 1000, hours_ago(10));
        std::os::unix::fs::symlink(
            outside.path().join("target.m4a"),
            dir.path().join("link.m4a"),
        )
        .unwrap();
        populate(
            dir.path(),
            &[
                ("a.m4a", 300, hours_ago(2)),
                ("b.m4a", 300, hours_ago(1)),
            ],
        );

        enforce(dir.path(), "m4a", 300).unwrap();

        assert!(dir.path().join("link.m4a").symlink_metadata().is_ok());
        assert!(outside.path().join("target.m4a").exists());
        assert!(!dir.path().join("a.m4a").exists());
    }

    #[tokio::test]
    async fn test_enforce_async() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &[
                ("a.m4a", 300, hours_ago(2)),
                ("b.m4a", 300, hours_ago(1)),
            ],
        );

        let policy =
            EvictionPolicy::new(dir.path(), "m4a", 300).with_grace_period(Duration::ZERO);
        let report = policy.enforce_async().await.unwrap();
        assert_eq!(report.files_deleted, 1);
        assert_eq!(policy.budget_bytes(), 300);
    }
}
