//! vpod Audio Server - podcast audio served through a fetch-through disk cache
//!
//! Audio for a video is downloaded with yt-dlp the first time a podcast
//! client asks for it, kept on disk, and trimmed back to a size budget by a
//! periodic eviction pass.

mod error;
mod scheduler;
mod server;
mod types;

use crate::error::{AudioServerError, Result};
use crate::scheduler::{run_eviction_schedule, SharedEvictionStatus};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::{AudioServerConfig, MB};
use audio_disk_cache::{AudioLoader, EvictionPolicy, LoaderOptions, AUDIO_EXTENSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use ytdlp_fetcher::YtDlpFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("vpod_audio_server=info".parse()?)
        .add_directive("audio_disk_cache=info".parse()?)
        .add_directive("ytdlp_fetcher=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting vpod audio server...");

    // Load configuration from environment
    let config = load_config()?;
    info!("Listening on {}:{}", config.host, config.port);
    info!("Audio dir: {:?}", config.audio_dir);
    info!("Max audio storage: {} MB", config.max_storage_bytes / MB);
    info!("Cull interval: {} seconds", config.cull_interval.as_secs());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AudioServerError::Config(format!("Invalid listen address: {}", e)))?;

    // Create loader and fetcher
    let fetcher = YtDlpFetcher::with_program(&config.ytdlp_path);
    let options = LoaderOptions {
        refresh_on_hit: config.refresh_on_hit,
        ..Default::default()
    };
    let loader = AudioLoader::with_options(&config.audio_dir, fetcher, options);
    loader.init().await?;

    // Spawn eviction schedule (first pass runs immediately)
    let last_eviction: SharedEvictionStatus = Arc::new(RwLock::new(None));
    let policy = EvictionPolicy::new(&config.audio_dir, AUDIO_EXTENSION, config.max_storage_bytes)
        .with_grace_period(config.eviction_grace);
    tokio::spawn(run_eviction_schedule(
        policy,
        config.cull_interval,
        last_eviction.clone(),
    ));

    // Create shared state
    let state: SharedState<YtDlpFetcher> = Arc::new(ServerState::new(
        loader,
        last_eviction,
        config.request_timeout,
    ));

    // Start HTTP server (blocking)
    start_server(state, addr)
        .await
        .map_err(|e| AudioServerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> Result<AudioServerConfig> {
    config_from(|name| std::env::var(name).ok())
}

/// Build the config from a variable lookup, falling back to defaults
fn config_from(var: impl Fn(&str) -> Option<String>) -> Result<AudioServerConfig> {
    let defaults = AudioServerConfig::default();
    let secs = |name: &str| {
        var(name)
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
    };

    let host = var("HOST").unwrap_or(defaults.host);

    let port = var("PORT")
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let audio_dir = var("AUDIO_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.audio_dir);

    let max_storage_bytes = var("MAX_AUDIO_STORAGE_BYTES")
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(defaults.max_storage_bytes);
    if max_storage_bytes < 0 {
        return Err(AudioServerError::Config(format!(
            "MAX_AUDIO_STORAGE_BYTES must not be negative, got {}",
            max_storage_bytes
        )));
    }

    let cull_interval = secs("CULL_INTERVAL_SECS").unwrap_or(defaults.cull_interval);
    if cull_interval.is_zero() {
        return Err(AudioServerError::Config(
            "CULL_INTERVAL_SECS must be greater than zero".to_string(),
        ));
    }

    let eviction_grace = secs("EVICTION_GRACE_SECS").unwrap_or(defaults.eviction_grace);

    let refresh_on_hit = var("REFRESH_ON_HIT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(defaults.refresh_on_hit);

    let request_timeout = secs("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout);

    let ytdlp_path = var("YTDLP_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.ytdlp_path);

    Ok(AudioServerConfig {
        host,
        port,
        audio_dir,
        max_storage_bytes,
        cull_interval,
        eviction_grace,
        refresh_on_hit,
        request_timeout,
        ytdlp_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<AudioServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config_from(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_defaults_when_unset() {
        let config = config_with(&[]).unwrap();
        let defaults = AudioServerConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.max_storage_bytes, defaults.max_storage_bytes);
        assert_eq!(config.cull_interval, defaults.cull_interval);
    }

    #[test]
    fn test_config_reads_overrides() {
        let config = config_with(&[
            ("PORT", "9000"),
            ("AUDIO_DIR", "/srv/audio"),
            ("MAX_AUDIO_STORAGE_BYTES", "2048"),
            ("CULL_INTERVAL_SECS", "60"),
            ("REFRESH_ON_HIT", "TRUE"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.audio_dir, PathBuf::from("/srv/audio"));
        assert_eq!(config.max_storage_bytes, 2048);
        assert_eq!(config.cull_interval, Duration::from_secs(60));
        assert!(config.refresh_on_hit);
    }

    #[test]
    fn test_config_rejects_negative_budget() {
        let result = config_with(&[("MAX_AUDIO_STORAGE_BYTES", "-1")]);
        assert!(matches!(result, Err(AudioServerError::Config(_))));
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let result = config_with(&[("CULL_INTERVAL_SECS", "0")]);
        assert!(matches!(result, Err(AudioServerError::Config(_))));
    }
}
