use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{issue_anti_forgery, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::core::metrics;
use crate::db::models::ExamAttempt;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attempt::AttemptResponse;
use crate::services::{attempt_timer, question_set};

pub(in crate::api::attempts) async fn start_attempt(
    Path(test_id): Path<String>,
    CurrentUser(user, session): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    if user.role != UserRole::Student {
        return Err(ApiError::Forbidden("Only students can take tests"));
    }

    let test = repositories::catalog::find_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::lock_student_test(&mut *tx, &user.id, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire attempt lock"))?;

    let result = repositories::results::find_for_student_test(&mut *tx, &user.id, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?;
    if result.as_ref().is_some_and(|result| !result.reattempt_approved) {
        return Err(ApiError::Conflict("Attempt already completed".to_string()));
    }

    let existing = repositories::attempts::find_in_progress(&mut *tx, &user.id, &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    let (attempt, resumed) = match existing {
        Some(attempt) => {
            let exam = state.settings().exam();
            let remaining = attempt_timer::resumed_seconds(
                attempt.time_remaining_seconds,
                &test,
                exam,
                &attempt.id,
            );
            let attempt =
                repositories::attempts::record_resume(&mut *tx, &attempt.id, remaining, now)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to resume attempt"))?
                    .ok_or_else(|| ApiError::Conflict("Attempt is not in progress".to_string()))?;
            (attempt, true)
        }
        None => {
            let question_ids = repositories::catalog::list_question_ids(&mut *tx, &test.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
            if question_ids.is_empty() {
                return Err(ApiError::PreconditionFailed(
                    "Test has no questions available".to_string(),
                ));
            }

            let reattempt = result.is_some();
            if reattempt {
                let cleared = repositories::responses::delete_for_student_test(
                    &mut *tx, &user.id, &test.id,
                )
                .await
                .map_err(|e| ApiError::internal(e, "Failed to clear previous responses"))?;
                tracing::info!(
                    student_id = %user.id,
                    test_id = %test.id,
                    cleared,
                    "Starting approved reattempt"
                );
            }

            let latest =
                repositories::attempts::latest_attempt_number(&mut *tx, &user.id, &test.id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

            let attempt_id = Uuid::new_v4().to_string();
            let order = question_set::shuffled_order(question_ids);
            let attempt = repositories::attempts::create(
                &mut *tx,
                repositories::attempts::CreateAttempt {
                    id: &attempt_id,
                    student_id: &user.id,
                    test_id: &test.id,
                    attempt_number: latest + 1,
                    question_order: &order,
                    time_remaining_seconds: attempt_timer::duration_seconds(
                        &test,
                        state.settings().exam(),
                    ),
                    reattempt_approved: reattempt,
                    now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;
            (attempt, false)
        }
    };

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    metrics::record_attempt_opened(resumed);
    tracing::info!(
        attempt_id = %attempt.id,
        student_id = %user.id,
        test_id = %test.id,
        resumed,
        time_remaining_seconds = attempt.time_remaining_seconds,
        "Attempt opened"
    );

    let anti_forgery_token = issue_anti_forgery(&state, &user, &session);
    build_response(&state, attempt, resumed, anti_forgery_token).await.map(Json)
}

async fn build_response(
    state: &AppState,
    attempt: ExamAttempt,
    resumed: bool,
    anti_forgery_token: String,
) -> Result<AttemptResponse, ApiError> {
    let rendered = question_set::rendered_questions(state, &attempt)
        .await
        .map_err(|e| ApiError::internal(format!("{e:#}"), "Failed to load questions"))?;
    let responses = repositories::responses::list_for_student_test(
        state.db(),
        &attempt.student_id,
        &attempt.test_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to fetch saved responses"))?;

    Ok(AttemptResponse {
        anti_forgery_token,
        state_tick_interval_seconds: state.settings().exam().state_tick_interval_seconds,
        total_questions: attempt.question_order.0.len(),
        questions: question_set::merge_responses(rendered, &responses),
        started_at: format_primitive(attempt.started_at),
        attempt_id: attempt.id,
        test_id: attempt.test_id,
        status: attempt.status,
        attempt_number: attempt.attempt_number,
        resumed,
        time_remaining_seconds: attempt.time_remaining_seconds,
        current_question_index: attempt.current_question_index,
    })
}
