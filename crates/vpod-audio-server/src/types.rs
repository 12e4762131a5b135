//! Core types for the vpod audio server

use audio_disk_cache::{CacheStats, EvictionReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const KB: i64 = 1024;
pub const MB: i64 = KB * 1024;
pub const GB: i64 = MB * 1024;

/// Configuration for the audio server
#[derive(Debug, Clone)]
pub struct AudioServerConfig {
    pub host: String,
    pub port: u16,
    pub audio_dir: PathBuf,
    pub max_storage_bytes: i64,
    pub cull_interval: Duration,
    pub eviction_grace: Duration,
    pub refresh_on_hit: bool,
    pub request_timeout: Duration,
    pub ytdlp_path: PathBuf,
}

impl Default for AudioServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            audio_dir: PathBuf::from("."),
            max_storage_bytes: GB,
            cull_interval: Duration::from_secs(24 * 60 * 60),
            eviction_grace: Duration::from_secs(10 * 60),
            refresh_on_hit: false,
            request_timeout: Duration::from_secs(300),
            ytdlp_path: PathBuf::from("yt-dlp"),
        }
    }
}

/// The most recent eviction pass, as reported by /health
#[derive(Debug, Clone, Serialize)]
pub struct EvictionStatus {
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: EvictionOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EvictionOutcome {
    Completed(EvictionReport),
    Failed { error: String },
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
    pub last_eviction: Option<EvictionStatus>,
}
