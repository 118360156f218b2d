use std::collections::HashMap;

use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, seconds_between};
use crate::repositories;
use crate::services::submission_finalize::{finalize_attempt, FinalizeMode};

const SWEEP_BATCH_SIZE: i64 = 200;

/// Finalizes in-progress attempts whose client went silent after the timer
/// ran out, grading whatever was auto-saved. Returns how many were closed.
pub(crate) async fn close_abandoned_attempts(state: &AppState) -> Result<u64> {
    let now = primitive_now_utc();
    let grace_seconds =
        i64::try_from(state.settings().exam().abandoned_attempt_grace_seconds).unwrap_or(i64::MAX);

    let attempts =
        repositories::attempts::list_abandoned(state.db(), now, grace_seconds, SWEEP_BATCH_SIZE)
            .await
            .context("Failed to fetch abandoned attempts")?;

    let mut closed = 0u64;
    for attempt in attempts {
        let deadline =
            attempt.last_saved_at + Duration::seconds(i64::from(attempt.time_remaining_seconds));

        match finalize_attempt(state, &attempt, HashMap::new(), FinalizeMode::Timeout).await {
            Ok(outcome) if outcome.finalized_now => {
                closed += 1;
                tracing::info!(
                    attempt_id = %attempt.id,
                    overdue_seconds = seconds_between(deadline, now),
                    "Closed abandoned attempt"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(
                    attempt_id = %attempt.id,
                    error = %format!("{err:#}"),
                    "Failed to close abandoned attempt"
                );
            }
        }
    }

    if closed > 0 {
        tracing::info!(closed_attempts = closed, "Closed abandoned attempts");
    }
    metrics::counter!("abandoned_attempts_closed_total").increment(closed);

    Ok(closed)
}
