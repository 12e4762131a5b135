//! Fetch-through loading of audio files
//!
//! A key resolves to `<root>/<item>.<variant>.<ext>`. A non-empty regular file
//! at that path is served as-is; otherwise the fetcher is asked to produce it.
//! Concurrent misses for one key share a single fetch: the first caller spawns
//! it and everyone subscribes to its outcome. The fetch runs in its own task,
//! so it completes and populates the cache even if every caller gives up.

use crate::error::{AudioCacheError, Result};
use crate::fetcher::{AudioFetcher, FetchDirectives, FetchFailure, FetchRequest};
use crate::key::AudioKey;
use crate::types::{CacheStats, ResolvedAudio};
use crate::AUDIO_EXTENSION;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

type FetchOutcome = Result<ResolvedAudio>;
type InFlightMap = HashMap<AudioKey, broadcast::Sender<FetchOutcome>>;

/// Loader settings
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub extension: String,
    pub directives: FetchDirectives,
    /// Bump a file's mtime on every hit, making eviction least-recently-used
    /// instead of oldest-written.
    pub refresh_on_hit: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extension: AUDIO_EXTENSION.to_string(),
            directives: FetchDirectives::default(),
            refresh_on_hit: false,
        }
    }
}

/// Fetch-through loader for one storage root
pub struct AudioLoader<F> {
    inner: Arc<LoaderInner<F>>,
}

impl<F> Clone for AudioLoader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct LoaderInner<F> {
    root: PathBuf,
    fetcher: F,
    options: LoaderOptions,
    /// Fetches in progress: key -> channel the outcome is broadcast on
    in_flight: Mutex<InFlightMap>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

impl<F: AudioFetcher> AudioLoader<F> {
    pub fn new(root: impl Into<PathBuf>, fetcher: F) -> Self {
        Self::with_options(root, fetcher, LoaderOptions::default())
    }

    pub fn with_options(root: impl Into<PathBuf>, fetcher: F, options: LoaderOptions) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                root: root.into(),
                fetcher,
                options,
                in_flight: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                fetch_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Ensure the storage root exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.inner.root).await?;
        info!(root = ?self.inner.root, "Audio cache initialized");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// Where the file for `key` lives (whether or not it exists yet)
    pub fn destination(&self, key: &AudioKey) -> PathBuf {
        self.inner.destination(key)
    }

    /// Resolve a key to a complete file on disk, fetching it on a miss
    pub async fn resolve(&self, key: &AudioKey) -> Result<ResolvedAudio> {
        let destination = self.destination(key);

        if is_cached(&destination).await {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
            if self.inner.options.refresh_on_hit {
                refresh_mtime(destination.clone()).await;
            }
            return Ok(ResolvedAudio {
                path: destination,
                from_cache: true,
            });
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let mut outcome = self.join_or_start(key, destination);

        match outcome.recv().await {
            Ok(result) => result,
            Err(_) => Err(AudioCacheError::from(io::Error::other(format!(
                "fetch for {} ended without a result",
                key
            )))),
        }
    }

    /// Subscribe to the fetch already running for `key`, or start one
    fn join_or_start(
        &self,
        key: &AudioKey,
        destination: PathBuf,
    ) -> broadcast::Receiver<FetchOutcome> {
        let mut in_flight = self.inner.lock_in_flight();

        match in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Waiting on in-flight fetch");
                entry.get().subscribe()
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx.clone());

                let inner = Arc::clone(&self.inner);
                let key = key.clone();
                tokio::spawn(async move {
                    let registration = InFlight {
                        inner: Arc::clone(&inner),
                        key: key.clone(),
                    };
                    let outcome = inner.populate(&key, &destination).await;
                    // Deregister before sending: anyone who subscribed got in
                    // while the entry was still present, later callers see the file.
                    drop(registration);
                    let _ = tx.send(outcome);
                });

                rx
            }
        }
    }

    /// Get current loader statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            fetches: self.inner.fetches.load(Ordering::Relaxed),
            fetch_failures: self.inner.fetch_failures.load(Ordering::Relaxed),
            in_flight: self.inner.lock_in_flight().len(),
        }
    }
}

impl<F> LoaderInner<F> {
    fn destination(&self, key: &AudioKey) -> PathBuf {
        self.root.join(key.file_name(&self.options.extension))
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, InFlightMap> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: AudioFetcher> LoaderInner<F> {
    /// Run the fetcher for `key` and verify what it left behind.
    ///
    /// Not coalesced; callers go through `AudioLoader::resolve`.
    async fn populate(&self, key: &AudioKey, destination: &Path) -> FetchOutcome {
        // A fetch for this key may have completed since the caller checked.
        if is_cached(destination).await {
            return Ok(ResolvedAudio {
                path: destination.to_path_buf(),
                from_cache: true,
            });
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let request = FetchRequest {
            key: key.clone(),
            destination: destination.to_path_buf(),
            directives: self.options.directives.clone(),
        };

        info!(key = %key, destination = %destination.display(), "Fetching audio");
        let start = Instant::now();

        let failure = match self.fetcher.fetch(&request).await {
            Ok(()) => {
                if is_cached(destination).await {
                    info!(
                        key = %key,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Fetched audio"
                    );
                    return Ok(ResolvedAudio {
                        path: destination.to_path_buf(),
                        from_cache: false,
                    });
                }
                FetchFailure::new("fetcher reported success but produced no audio file", "")
            }
            Err(failure) => failure,
        };

        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        discard_partial(destination).await;
        error!(
            key = %key,
            error = %failure,
            stderr = %failure.stderr,
            "Failed to fetch audio"
        );

        Err(AudioCacheError::ExternalFetchFailed {
            item_id: key.item_id().to_string(),
            message: failure.message,
            stderr: failure.stderr,
        })
    }
}

/// Removes a key from the in-flight map when its fetch task ends, panics included
struct InFlight<F> {
    inner: Arc<LoaderInner<F>>,
    key: AudioKey,
}

impl<F> Drop for InFlight<F> {
    fn drop(&mut self) {
        self.inner.lock_in_flight().remove(&self.key);
    }
}

/// A cache hit is a non-empty regular file; symlinks and directories are not
async fn is_cached(path: &Path) -> bool {
    match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata.file_type().is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}

async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial audio file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial audio file"),
    }
}

async fn refresh_mtime(path: PathBuf) {
    let result = tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(SystemTime::now())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to refresh audio file mtime"),
        Err(e) => warn!(error = %e, "Refresh task failed"),
    }
}
