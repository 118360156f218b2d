use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::extract::ApiJson;
use crate::api::guards::{issue_anti_forgery, require_anti_forgery, CurrentStaff};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::result::{AntiForgeryResponse, ReattemptRequest, ResultResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/anti-forgery-token", get(anti_forgery_token))
        .route("/tests/:test_id/students/:student_id/reattempt", post(approve_reattempt))
        .route("/tests/:test_id/students/:student_id/result", get(get_student_result))
}

async fn anti_forgery_token(
    CurrentStaff(staff, session): CurrentStaff,
    State(state): State<AppState>,
) -> Json<AntiForgeryResponse> {
    Json(AntiForgeryResponse { anti_forgery_token: issue_anti_forgery(&state, &staff, &session) })
}

/// Lets the student start a fresh attempt. Attempts and responses are left
/// alone; the next start clears them.
async fn approve_reattempt(
    Path((test_id, student_id)): Path<(String, String)>,
    CurrentStaff(staff, session): CurrentStaff,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ReattemptRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    require_anti_forgery(&state, &staff, &session, &payload.anti_forgery_token)?;

    let result = repositories::results::approve_reattempt(
        state.db(),
        &student_id,
        &test_id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to approve reattempt"))?
    .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    tracing::info!(staff_id = %staff.id, %student_id, %test_id, "Reattempt approved");

    Ok(Json(ResultResponse::from(result)))
}

async fn get_student_result(
    Path((test_id, student_id)): Path<(String, String)>,
    CurrentStaff(..): CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let result = repositories::results::find_for_student_test(state.db(), &student_id, &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    Ok(Json(ResultResponse::from(result)))
}
