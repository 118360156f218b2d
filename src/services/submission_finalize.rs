use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{ExamAttempt, ExamResult, Test};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::services::grading::{self, Completion};
use crate::services::question_set;

pub(crate) const TIMEOUT_REASON: &str = "timeout";

#[derive(Debug, Clone, Copy)]
pub(crate) enum FinalizeMode<'a> {
    ManualSubmit,
    /// Client-side timer expiry or the abandoned-attempt sweeper.
    Timeout,
    /// External violation signal; the reason is recorded as reported.
    Violation(&'a str),
}

impl<'a> FinalizeMode<'a> {
    fn attempt_status(self) -> AttemptStatus {
        match self {
            Self::ManualSubmit | Self::Timeout => AttemptStatus::Submitted,
            Self::Violation(_) => AttemptStatus::Terminated,
        }
    }

    fn reason(self) -> Option<&'a str> {
        match self {
            Self::ManualSubmit => None,
            Self::Timeout => Some(TIMEOUT_REASON),
            Self::Violation(reason) => Some(reason),
        }
    }

    fn completion(self) -> Completion {
        match self {
            Self::ManualSubmit | Self::Timeout => Completion::Submitted,
            Self::Violation(_) => Completion::Terminated,
        }
    }

    fn outcome(self) -> &'static str {
        match self {
            Self::ManualSubmit => "submitted",
            Self::Timeout => "timeout",
            Self::Violation(_) => "terminated",
        }
    }
}

#[derive(Debug)]
pub(crate) struct FinalizeOutcome {
    pub(crate) result: ExamResult,
    /// False when another caller had already finalized the attempt.
    pub(crate) finalized_now: bool,
}

/// Moves the attempt to its terminal status and records the graded result in
/// one transaction. Concurrent or repeated calls finalize at most once; the
/// losers get the existing result back.
///
/// `submitted` must only contain question ids from the frozen order.
pub(crate) async fn finalize_attempt(
    state: &AppState,
    attempt: &ExamAttempt,
    submitted: HashMap<String, String>,
    mode: FinalizeMode<'_>,
) -> Result<FinalizeOutcome> {
    let now = primitive_now_utc();
    let mut tx = state.db().begin().await.context("Failed to start transaction")?;

    let finished = repositories::attempts::finish(
        &mut *tx,
        &attempt.id,
        mode.attempt_status(),
        mode.reason(),
        now,
    )
    .await
    .context("Failed to transition attempt")?;

    let Some(finished) = finished else {
        tx.rollback().await.context("Failed to roll back transaction")?;
        let result = repositories::results::find_for_student_test(
            state.db(),
            &attempt.student_id,
            &attempt.test_id,
        )
        .await
        .context("Failed to fetch existing result")?
        .ok_or_else(|| anyhow!("Attempt {} is finished but has no result", attempt.id))?;

        tracing::info!(attempt_id = %attempt.id, "Attempt already finalized; returning existing result");
        return Ok(FinalizeOutcome { result, finalized_now: false });
    };

    let test = repositories::catalog::find_test(&mut *tx, &finished.test_id)
        .await
        .context("Failed to fetch test")?
        .ok_or_else(|| anyhow!("Test {} not found", finished.test_id))?;
    let stored = repositories::responses::list_for_student_test(
        &mut *tx,
        &finished.student_id,
        &finished.test_id,
    )
    .await
    .context("Failed to fetch stored responses")?;
    let questions =
        repositories::catalog::list_questions_by_ids(&mut *tx, &finished.question_order.0)
            .await
            .context("Failed to fetch answer keys")?;

    let keys: HashMap<String, _> =
        questions.into_iter().map(|question| (question.id, question.answer_key.0)).collect();
    let answers = grading::merge_answers(&stored, submitted);
    let score = grading::grade(&finished.question_order.0, &keys, &answers);
    let status = grading::result_status(
        score,
        mode.completion(),
        pass_mark(&test, state.settings().exam().default_pass_percentage),
    );

    let result_id = Uuid::new_v4().to_string();
    let result = repositories::results::record(
        &mut *tx,
        repositories::results::RecordResult {
            id: &result_id,
            student_id: &finished.student_id,
            test_id: &finished.test_id,
            attempt_id: &finished.id,
            score: score.correct,
            total_questions: score.total,
            status,
            now,
        },
    )
    .await
    .context("Failed to record result")?;

    tx.commit().await.context("Failed to commit transaction")?;

    question_set::release_cache(state, &finished.id).await;
    metrics::record_attempt_finalized(mode.outcome());
    tracing::info!(
        attempt_id = %finished.id,
        student_id = %finished.student_id,
        test_id = %finished.test_id,
        outcome = mode.outcome(),
        score = score.correct,
        total_questions = score.total,
        "Attempt finalized"
    );

    Ok(FinalizeOutcome { result, finalized_now: true })
}

fn pass_mark(test: &Test, default_pass_percentage: Option<u8>) -> Option<u8> {
    test.pass_percentage.and_then(|value| u8::try_from(value).ok()).or(default_pass_percentage)
}
