use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::ExamResult;
use crate::db::types::ResultStatus;

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_id: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) status: ResultStatus,
    pub(crate) reattempt_approved: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<ExamResult> for ResultResponse {
    fn from(result: ExamResult) -> Self {
        Self {
            id: result.id,
            student_id: result.student_id,
            test_id: result.test_id,
            attempt_id: result.attempt_id,
            score: result.score,
            total_questions: result.total_questions,
            status: result.status,
            reattempt_approved: result.reattempt_approved,
            created_at: format_primitive(result.created_at),
            updated_at: format_primitive(result.updated_at),
        }
    }
}

/// Returned by submit and terminate: where the client finds the result.
#[derive(Debug, Serialize)]
pub(crate) struct ResultReference {
    pub(crate) result_url: String,
    /// False when the attempt had already been finalized by an earlier call.
    pub(crate) finalized_now: bool,
    pub(crate) result: ResultResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReattemptRequest {
    pub(crate) anti_forgery_token: String,
}

/// Anti-forgery token for the caller's bearer session, for staff tooling.
#[derive(Debug, Serialize)]
pub(crate) struct AntiForgeryResponse {
    pub(crate) anti_forgery_token: String,
}
