//! HTTP server for audio endpoints
//!
//! Provides /health and /audio/{item}/{variant} endpoints.

use crate::error::AudioServerError;
use crate::scheduler::SharedEvictionStatus;
use crate::types::HealthResponse;
use audio_disk_cache::{AudioFetcher, AudioKey, AudioLoader, ResolvedAudio};
use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Content type podcast clients expect for .m4a enclosures
const M4A_CONTENT_TYPE: &str = "audio/x-m4a";

/// Shared state for the HTTP server
pub struct ServerState<F> {
    pub loader: AudioLoader<F>,
    pub last_eviction: SharedEvictionStatus,
    pub request_timeout: Duration,
    pub started_at: DateTime<Utc>,
}

impl<F: AudioFetcher> ServerState<F> {
    pub fn new(
        loader: AudioLoader<F>,
        last_eviction: SharedEvictionStatus,
        request_timeout: Duration,
    ) -> Self {
        Self {
            loader,
            last_eviction,
            request_timeout,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState<F> = Arc<ServerState<F>>;

/// Create the HTTP router
pub fn create_router<F: AudioFetcher>(state: SharedState<F>) -> Router {
    Router::new()
        .route("/health", get(health::<F>))
        .route("/audio/{item_id}/{variant}", get(get_audio::<F>))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server<F: AudioFetcher>(
    state: SharedState<F>,
    addr: SocketAddr,
) -> std::io::Result<()> {
    let router = create_router(state);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health<F: AudioFetcher>(State(state): State<SharedState<F>>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.loader.stats(),
        last_eviction: state.last_eviction.read().await.clone(),
    })
}

/// Get the audio for a source item in the given format
async fn get_audio<F: AudioFetcher>(
    State(state): State<SharedState<F>>,
    Path((item_id, variant)): Path<(String, String)>,
    request: Request,
) -> Response {
    match resolve_audio(&state, item_id, variant).await {
        Ok(resolved) => serve_audio(resolved, request).await,
        Err(e) => e.into_response(),
    }
}

/// Validate the key and wait for the loader, up to the request timeout.
///
/// A timeout only abandons the wait; the fetch keeps running and the next
/// request for the key finds the file.
async fn resolve_audio<F: AudioFetcher>(
    state: &ServerState<F>,
    item_id: String,
    variant: String,
) -> Result<ResolvedAudio, AudioServerError> {
    let key = AudioKey::new(item_id, variant)?;

    match tokio::time::timeout(state.request_timeout, state.loader.resolve(&key)).await {
        Ok(Ok(resolved)) => Ok(resolved),
        Ok(Err(e)) => {
            error!(key = %key, error = %e, "Failed to get audio");
            Err(e.into())
        }
        Err(_) => {
            warn!(
                key = %key,
                timeout_secs = state.request_timeout.as_secs(),
                "Audio not ready before request timeout"
            );
            Err(AudioServerError::Timeout(state.request_timeout))
        }
    }
}

/// Stream a resolved file with range support
async fn serve_audio(resolved: ResolvedAudio, request: Request) -> Response {
    let response = match ServeFile::new(&resolved.path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    let success = response.status().is_success();
    let headers = response.headers_mut();
    if success {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(M4A_CONTENT_TYPE),
        );
    }
    headers.insert(
        "X-Cache",
        HeaderValue::from_static(if resolved.from_cache { "HIT" } else { "MISS" }),
    );

    response
}
