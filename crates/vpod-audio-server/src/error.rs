//! Error types for the vpod audio server

use audio_disk_cache::AudioCacheError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum AudioServerError {
    Cache(AudioCacheError),
    Timeout(Duration),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for AudioServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioServerError::Cache(err) => write!(f, "Cache error: {}", err),
            AudioServerError::Timeout(after) => {
                write!(f, "Timed out after {} seconds", after.as_secs())
            }
            AudioServerError::Io(err) => write!(f, "IO error: {}", err),
            AudioServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AudioServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AudioServerError::Cache(err) => Some(err),
            AudioServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<AudioCacheError> for AudioServerError {
    fn from(err: AudioCacheError) -> Self {
        AudioServerError::Cache(err)
    }
}

impl From<std::io::Error> for AudioServerError {
    fn from(err: std::io::Error) -> Self {
        AudioServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for AudioServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        AudioServerError::Config(err.to_string())
    }
}

impl IntoResponse for AudioServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AudioServerError::Cache(AudioCacheError::InvalidKey(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AudioServerError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Audio is still being prepared, try again later".to_string(),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AudioServerError>;
