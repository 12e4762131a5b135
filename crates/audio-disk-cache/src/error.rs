//! Error types for the audio disk cache

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Errors produced by key validation, fetching, scanning and eviction.
///
/// Cloneable so a single fetch outcome can be handed to every caller that
/// waited on it; I/O errors are shared behind an `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum AudioCacheError {
    InvalidKey(String),
    ExternalFetchFailed {
        item_id: String,
        message: String,
        stderr: String,
    },
    ScanFailed {
        path: PathBuf,
        source: Arc<io::Error>,
    },
    DeleteFailed {
        path: PathBuf,
        source: Arc<io::Error>,
    },
    Io(Arc<io::Error>),
}

impl AudioCacheError {
    pub(crate) fn scan_failed(path: impl Into<PathBuf>, err: io::Error) -> Self {
        AudioCacheError::ScanFailed {
            path: path.into(),
            source: Arc::new(err),
        }
    }

    pub(crate) fn delete_failed(path: impl Into<PathBuf>, err: io::Error) -> Self {
        AudioCacheError::DeleteFailed {
            path: path.into(),
            source: Arc::new(err),
        }
    }
}

impl fmt::Display for AudioCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCacheError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            AudioCacheError::ExternalFetchFailed {
                item_id, message, ..
            } => write!(f, "External fetch failed for {}: {}", item_id, message),
            AudioCacheError::ScanFailed { path, source } => {
                write!(f, "Scan failed at {}: {}", path.display(), source)
            }
            AudioCacheError::DeleteFailed { path, source } => {
                write!(f, "Delete failed for {}: {}", path.display(), source)
            }
            AudioCacheError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for AudioCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AudioCacheError::ScanFailed { source, .. } => Some(source.as_ref()),
            AudioCacheError::DeleteFailed { source, .. } => Some(source.as_ref()),
            AudioCacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for AudioCacheError {
    fn from(err: io::Error) -> Self {
        AudioCacheError::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, AudioCacheError>;
