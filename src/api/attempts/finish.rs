use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::attempts::helpers::{fetch_owned_attempt, normalize_answers, result_reference};
use crate::api::errors::ApiError;
use crate::api::extract::ApiJson;
use crate::api::guards::{require_anti_forgery, CurrentUser};
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::attempt::{SubmitRequest, TerminateRequest};
use crate::schemas::result::{ResultReference, ResultResponse};
use crate::services::submission_finalize::{finalize_attempt, FinalizeMode};

pub(in crate::api::attempts) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user, session): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SubmitRequest>,
) -> Result<Json<ResultReference>, ApiError> {
    require_anti_forgery(&state, &user, &session, &payload.anti_forgery_token)?;

    let attempt = fetch_owned_attempt(&state, &attempt_id, &user).await?;
    let answers = normalize_answers(&attempt, payload.answers)?;
    let mode = if payload.timed_out { FinalizeMode::Timeout } else { FinalizeMode::ManualSubmit };

    let outcome = finalize_attempt(&state, &attempt, answers, mode)
        .await
        .map_err(|e| ApiError::internal(format!("{e:#}"), "Failed to submit attempt"))?;

    Ok(Json(result_reference(&state, outcome.result, outcome.finalized_now)))
}

/// Ends the attempt on a client-reported violation. The reason is recorded
/// as sent; nothing server-side corroborates it.
pub(in crate::api::attempts) async fn terminate_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user, session): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<TerminateRequest>,
) -> Result<Json<ResultReference>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_anti_forgery(&state, &user, &session, &payload.anti_forgery_token)?;

    let attempt = fetch_owned_attempt(&state, &attempt_id, &user).await?;
    let answers = normalize_answers(&attempt, payload.answers)?;

    let outcome = finalize_attempt(
        &state,
        &attempt,
        answers,
        FinalizeMode::Violation(payload.reason.trim()),
    )
    .await
    .map_err(|e| ApiError::internal(format!("{e:#}"), "Failed to terminate attempt"))?;

    Ok(Json(result_reference(&state, outcome.result, outcome.finalized_now)))
}

pub(in crate::api::attempts) async fn get_my_result(
    Path(test_id): Path<String>,
    CurrentUser(user, _): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let result = repositories::results::find_for_student_test(state.db(), &user.id, &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    Ok(Json(ResultResponse::from(result)))
}
