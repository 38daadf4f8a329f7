use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::technician::Technician;
use crate::state::AppState;
use crate::store::StoreError;

const MAX_BACKOFF_FACTOR: u32 = 8;

/// Demotes technicians whose location pushes have stopped.
pub async fn run_presence_sweeper(state: Arc<AppState>, timeout: Duration, interval: Duration) {
    info!(
        timeout_secs = timeout.as_secs(),
        interval_secs = interval.as_secs(),
        "presence sweeper started"
    );

    let mut backoff = 1;
    loop {
        sleep(interval * backoff).await;

        match sweep_stale(&state, timeout).await {
            Ok(demoted) => {
                if demoted > 0 {
                    info!(demoted, "stale technicians marked unavailable");
                }
                backoff = 1;
            }
            Err(err) => {
                backoff = (backoff * 2).min(MAX_BACKOFF_FACTOR);
                error!(error = %err, next_delay_factor = backoff, "presence sweep failed");
            }
        }
    }
}

/// One pass: returns how many technicians were demoted.
pub async fn sweep_stale(state: &AppState, timeout: Duration) -> Result<usize, AppError> {
    let timeout = chrono::Duration::from_std(timeout)
        .map_err(|err| AppError::Internal(format!("invalid presence timeout: {err}")))?;
    let cutoff = Utc::now() - timeout;

    let technicians = state.store.list_technicians().await?;
    let mut demoted = 0;
    let mut available = 0;

    for technician in technicians {
        if !technician.is_available {
            continue;
        }
        if technician.last_seen_at >= cutoff {
            available += 1;
            continue;
        }

        let result = state
            .store
            .update_technician(
                technician.id,
                Box::new(move |current: &mut Technician| {
                    // a push may have landed since the listing
                    if current.last_seen_at >= cutoff {
                        return Err(StoreError::Conflict("presence refreshed".to_string()));
                    }
                    current.is_available = false;
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(_) => {
                demoted += 1;
                warn!(
                    technician_id = %technician.id,
                    last_seen_at = %technician.last_seen_at,
                    "technician presence expired"
                );
            }
            Err(StoreError::Conflict(_)) => available += 1,
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }

    state.metrics.available_technicians.set(available);
    Ok(demoted)
}
