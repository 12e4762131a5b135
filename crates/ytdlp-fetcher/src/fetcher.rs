//! Running yt-dlp for a single audio file

use audio_disk_cache::{AudioFetcher, FetchFailure, FetchRequest};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Watch page the item id is appended to
pub const DEFAULT_WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Fetches audio by shelling out to yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    watch_url: String,
}

impl YtDlpFetcher {
    /// Create a fetcher that runs `yt-dlp` from `PATH`
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            watch_url: DEFAULT_WATCH_URL.to_string(),
        }
    }

    pub fn with_watch_url(mut self, watch_url: impl Into<String>) -> Self {
        self.watch_url = watch_url.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Build the yt-dlp argument list for a request
    pub fn build_args(&self, request: &FetchRequest) -> Vec<String> {
        let directives = &request.directives;
        let mut args = vec![format!("--format={}", request.key.variant())];

        if directives.embed_metadata {
            args.push("--embed-metadata".to_string());
        }
        if directives.embed_thumbnail {
            args.push("--embed-thumbnail".to_string());
        }
        if !directives.sponsorblock_remove.is_empty() {
            args.push(format!(
                "--sponsorblock-remove={}",
                directives.sponsorblock_remove.join(",")
            ));
        }

        args.push("--no-playlist".to_string());
        args.push("--no-progress".to_string());
        // Eviction ages files by mtime; keep it at download time.
        args.push("--no-mtime".to_string());
        // --output takes a template; a literal % has to be doubled.
        args.push(format!(
            "--output={}",
            request.destination.to_string_lossy().replace('%', "%%")
        ));
        args.push(format!("{}{}", self.watch_url, request.key.item_id()));

        args
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<(), FetchFailure> {
        let args = self.build_args(request);
        debug!(program = %self.program.display(), args = ?args, "Running yt-dlp");

        let mut command = Command::new(&self.program);
        command.args(&args);
        // Run inside the storage root; relative destinations keep the process cwd
        if let Some(dir) = request.destination.parent().filter(|d| d.is_absolute()) {
            command.current_dir(dir);
        }

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                FetchFailure::new(
                    format!("failed to run {}: {}", self.program.display(), e),
                    "",
                )
            })?;

        if output.status.success() {
            return Ok(());
        }

        remove_leftovers(&request.destination).await;

        Err(FetchFailure::new(
            format!("yt-dlp exited with {}", output.status),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// yt-dlp downloads into `<output>.part` and renames on completion
async fn remove_leftovers(destination: &Path) {
    for suffix in [".part", ".ytdl"] {
        let mut leftover = OsString::from(destination.as_os_str());
        leftover.push(suffix);
        let leftover = PathBuf::from(leftover);

        match tokio::fs::remove_file(&leftover).await {
            Ok(()) => debug!(path = %leftover.display(), "Removed yt-dlp leftover"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %leftover.display(), error = %e, "Failed to remove yt-dlp leftover"),
        }
    }
}
