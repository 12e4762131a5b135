//! The external fetcher seam

use crate::key::AudioKey;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

/// Post-processing options passed through to the fetcher untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDirectives {
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    /// Sponsor-segment categories to cut from the audio
    pub sponsorblock_remove: Vec<String>,
}

impl Default for FetchDirectives {
    fn default() -> Self {
        Self {
            embed_metadata: true,
            embed_thumbnail: true,
            sponsorblock_remove: vec!["sponsor".to_string()],
        }
    }
}

/// Everything a fetcher needs to produce one audio file
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub key: AudioKey,
    /// Where the finished file must end up
    pub destination: PathBuf,
    pub directives: FetchDirectives,
}

/// A failed fetch, with whatever the tool wrote to stderr
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub message: String,
    pub stderr: String,
}

impl FetchFailure {
    pub fn new(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stderr: stderr.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Produces the file for a key on a cache miss.
///
/// Returning `Ok` means the tool itself reported success. The loader still
/// checks the destination before trusting it.
pub trait AudioFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<(), FetchFailure>> + Send;
}
