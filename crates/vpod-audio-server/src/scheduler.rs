//! Periodic eviction of cached audio
//!
//! One task owns the eviction policy and runs a pass immediately on startup,
//! then once per interval. Passes run one after another inside that task, so
//! two passes never overlap.

use crate::types::{EvictionOutcome, EvictionStatus};
use audio_disk_cache::EvictionPolicy;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

pub type SharedEvictionStatus = Arc<RwLock<Option<EvictionStatus>>>;

/// Run eviction passes forever
pub async fn run_eviction_schedule(
    policy: EvictionPolicy,
    period: Duration,
    status: SharedEvictionStatus,
) {
    info!(
        root = %policy.root().display(),
        budget_bytes = policy.budget_bytes(),
        interval_secs = period.as_secs(),
        "Starting audio eviction schedule"
    );

    let mut ticker = interval(period);
    // A pass that overruns its slot pushes the next one back rather than
    // triggering a burst of catch-up passes.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately.
        ticker.tick().await;
        run_eviction_pass(&policy, &status).await;
    }
}

/// Run one pass and record how it went
pub async fn run_eviction_pass(policy: &EvictionPolicy, status: &SharedEvictionStatus) {
    let outcome = match policy.enforce_async().await {
        Ok(report) => {
            if report.evicted_anything() {
                info!(
                    files_deleted = report.files_deleted,
                    bytes_freed = report.bytes_freed,
                    size_bytes = report.size_after,
                    duration_ms = report.duration_ms,
                    "Eviction pass complete"
                );
            }
            EvictionOutcome::Completed(report)
        }
        Err(e) => {
            error!(error = %e, "Eviction pass failed");
            EvictionOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    *status.write().await = Some(EvictionStatus {
        finished_at: Utc::now(),
        outcome,
    });
}
