//! yt-dlp backed audio fetcher
//!
//! Downloads the audio track of a video with the `yt-dlp` command line tool,
//! writing it straight to the path the cache asked for.

pub mod fetcher;

pub use fetcher::{YtDlpFetcher, DEFAULT_WATCH_URL};
