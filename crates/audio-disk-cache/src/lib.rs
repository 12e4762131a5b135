//! Fetch-through disk cache for audio files
//!
//! Audio files are materialized on first request by an external fetcher and
//! kept under a single storage root. A separate eviction pass walks the root
//! and deletes the oldest files whenever the total size exceeds a byte budget.

pub mod error;
pub mod eviction;
pub mod fetcher;
pub mod inventory;
pub mod key;
pub mod loader;
pub mod types;

#[cfg(test)]
mod testutil;

pub use error::{AudioCacheError, Result};
pub use eviction::{enforce, EvictionPolicy};
pub use fetcher::{AudioFetcher, FetchDirectives, FetchFailure, FetchRequest};
pub use inventory::scan;
pub use key::AudioKey;
pub use loader::{AudioLoader, LoaderOptions};
pub use types::{CacheStats, CachedObject, EvictionReport, Inventory, ResolvedAudio};

/// File extension of the audio files this crate manages
pub const AUDIO_EXTENSION: &str = "m4a";
