use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AnswerKey, AttemptStatus, ResultStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Test {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) subject: String,
    pub(crate) class_name: String,
    pub(crate) academic_year: String,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) pass_percentage: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) position: i32,
    pub(crate) prompt: String,
    pub(crate) image_ref: Option<String>,
    pub(crate) answer_key: Json<AnswerKey>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_number: i32,
    /// Frozen question order; fixed for the lifetime of the attempt.
    pub(crate) question_order: Json<Vec<String>>,
    pub(crate) time_remaining_seconds: i32,
    pub(crate) current_question_index: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) reattempt_approved: bool,
    pub(crate) termination_reason: Option<String>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) last_saved_at: PrimitiveDateTime,
    pub(crate) finished_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionResponse {
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) question_id: String,
    pub(crate) answer_value: Option<String>,
    pub(crate) is_flagged: bool,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamResult {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_id: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) status: ResultStatus,
    pub(crate) reattempt_approved: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
