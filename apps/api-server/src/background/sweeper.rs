//! Stale counter sweeper.
//!
//! Records whose window started long ago are never read again except to be
//! reset. Purging them keeps the counter table bounded by active callers.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sheetwise_core::ports::{CounterSweep, StoreError};

/// Oldest `window_start` worth keeping: two windows before `now`.
pub fn stale_cutoff(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    let horizon = TimeDelta::from_std(window.checked_mul(2)?).ok()?;
    now.checked_sub_signed(horizon)
}

/// Run one sweep pass. Returns the number of records removed.
pub async fn sweep(
    store: &dyn CounterSweep,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let Some(cutoff) = stale_cutoff(now, window) else {
        return Ok(0);
    };

    let purged = store.purge_stale(cutoff).await?;
    tracing::info!(purged, cutoff = %cutoff.to_rfc3339(), "Stale rate records purged");
    Ok(purged)
}

/// Register the sweep pass on `scheduler`.
#[cfg(feature = "scheduler")]
pub async fn schedule(
    scheduler: &super::Scheduler,
    store: std::sync::Arc<dyn CounterSweep>,
    window: Duration,
    cron: &str,
) -> Result<(), tokio_cron_scheduler::JobSchedulerError> {
    scheduler
        .add_cron(cron, move || {
            let store = store.clone();
            async move {
                if let Err(e) = sweep(store.as_ref(), window, Utc::now()).await {
                    tracing::error!(error = %e, "Counter sweep failed");
                }
            }
        })
        .await
}
