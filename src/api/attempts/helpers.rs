use std::collections::HashMap;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::{ExamAttempt, ExamResult, User};
use crate::repositories;
use crate::schemas::attempt::AnswerValue;
use crate::schemas::result::{ResultReference, ResultResponse};

/// Loads an attempt the caller owns.
pub(crate) async fn fetch_owned_attempt(
    state: &AppState,
    attempt_id: &str,
    user: &User,
) -> Result<ExamAttempt, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    Ok(attempt)
}

pub(crate) fn require_in_progress(attempt: &ExamAttempt) -> Result<(), ApiError> {
    if attempt.status.is_terminal() {
        return Err(ApiError::Conflict("Attempt is not in progress".to_string()));
    }
    Ok(())
}

pub(crate) fn require_frozen_question(
    attempt: &ExamAttempt,
    question_id: &str,
) -> Result<(), ApiError> {
    if attempt.question_order.0.iter().any(|id| id == question_id) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Question '{question_id}' is not part of this attempt")))
    }
}

/// Validates submitted answers against the frozen set and converts them to
/// their stored text form. Null answers are dropped so saved responses apply.
pub(crate) fn normalize_answers(
    attempt: &ExamAttempt,
    answers: HashMap<String, Option<AnswerValue>>,
) -> Result<HashMap<String, String>, ApiError> {
    let mut normalized = HashMap::with_capacity(answers.len());
    for (question_id, value) in answers {
        require_frozen_question(attempt, &question_id)?;
        if let Some(value) = value {
            normalized.insert(question_id, value.into_stored());
        }
    }
    Ok(normalized)
}

pub(crate) fn result_reference(
    state: &AppState,
    result: ExamResult,
    finalized_now: bool,
) -> ResultReference {
    ResultReference {
        result_url: format!(
            "{}/tests/{}/result",
            state.settings().api().api_v1_str,
            result.test_id
        ),
        finalized_now,
        result: ResultResponse::from(result),
    }
}
