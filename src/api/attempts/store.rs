use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::attempts::helpers::{
    fetch_owned_attempt, require_frozen_question, require_in_progress,
};
use crate::api::errors::ApiError;
use crate::api::extract::ApiJson;
use crate::api::guards::{require_anti_forgery, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::attempt::{SaveAnswerRequest, SaveFlagRequest, SaveStateRequest, StoreResponse};

pub(in crate::api::attempts) async fn save_answer(
    Path(attempt_id): Path<String>,
    CurrentUser(user, session): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SaveAnswerRequest>,
) -> Result<(StatusCode, Json<StoreResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_anti_forgery(&state, &user, &session, &payload.anti_forgery_token)?;

    let attempt = fetch_owned_attempt(&state, &attempt_id, &user).await?;
    require_in_progress(&attempt)?;
    require_frozen_question(&attempt, &payload.question_id)?;

    let answer_value = payload.answer_value.into_stored();
    let saved = repositories::responses::save_answer(
        state.db(),
        &attempt.student_id,
        &attempt.test_id,
        &payload.question_id,
        &answer_value,
        primitive_now_utc(),
    )
    .await;

    match saved {
        Ok(()) => Ok((StatusCode::OK, Json(StoreResponse::saved("Answer saved")))),
        Err(err) => {
            tracing::error!(
                error = %err,
                attempt_id = %attempt.id,
                question_id = %payload.question_id,
                "Failed to save answer"
            );
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(StoreResponse::failed("Failed to save answer"))))
        }
    }
}

pub(in crate::api::attempts) async fn save_flag(
    Path(attempt_id): Path<String>,
    CurrentUser(user, session): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SaveFlagRequest>,
) -> Result<(StatusCode, Json<StoreResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_anti_forgery(&state, &user, &session, &payload.anti_forgery_token)?;

    let attempt = fetch_owned_attempt(&state, &attempt_id, &user).await?;
    require_in_progress(&attempt)?;
    require_frozen_question(&attempt, &payload.question_id)?;

    let saved = repositories::responses::save_flag(
        state.db(),
        &attempt.student_id,
        &attempt.test_id,
        &payload.question_id,
        payload.is_flagged,
        primitive_now_utc(),
    )
    .await;

    match saved {
        Ok(()) => {
            let message = if payload.is_flagged { "Question flagged" } else { "Flag cleared" };
            Ok((StatusCode::OK, Json(StoreResponse::saved(message))))
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                attempt_id = %attempt.id,
                question_id = %payload.question_id,
                "Failed to save flag"
            );
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(StoreResponse::failed("Failed to save flag"))))
        }
    }
}

/// Timer tick. Best effort on the client side; a lost tick only costs the
/// seconds since the previous one.
pub(in crate::api::attempts) async fn save_state(
    Path(attempt_id): Path<String>,
    CurrentUser(user, session): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SaveStateRequest>,
) -> Result<StatusCode, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_anti_forgery(&state, &user, &session, &payload.anti_forgery_token)?;

    let attempt = fetch_owned_attempt(&state, &attempt_id, &user).await?;
    require_in_progress(&attempt)?;

    let question_count = attempt.question_order.0.len();
    if usize::try_from(payload.current_question_index).map_or(true, |index| index >= question_count)
    {
        return Err(ApiError::BadRequest(format!(
            "current_question_index must be in range 0..{question_count}"
        )));
    }

    // The clock only runs down; a tick can never buy back time.
    if payload.time_remaining > attempt.time_remaining_seconds {
        tracing::warn!(
            attempt_id = %attempt.id,
            reported = payload.time_remaining,
            stored = attempt.time_remaining_seconds,
            "Ignoring timer tick that would extend the attempt"
        );
    }
    let time_remaining = payload.time_remaining.min(attempt.time_remaining_seconds);

    let updated = repositories::attempts::save_state(
        state.db(),
        &attempt.id,
        time_remaining,
        payload.current_question_index,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save attempt state"))?;

    if !updated {
        return Err(ApiError::Conflict("Attempt is not in progress".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
