use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Question;
use crate::db::types::{AttemptStatus, QuestionKind};

/// Render-only view of a catalog question. Never carries the answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RenderedQuestion {
    pub(crate) id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) image_ref: Option<String>,
    pub(crate) options: Option<Vec<String>>,
}

impl RenderedQuestion {
    pub(crate) fn from_question(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            kind: question.answer_key.0.kind(),
            prompt: question.prompt.clone(),
            image_ref: question.image_ref.clone(),
            options: question.answer_key.0.options().map(|options| options.to_vec()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    #[serde(flatten)]
    pub(crate) question: RenderedQuestion,
    pub(crate) saved_answer: Option<String>,
    pub(crate) is_flagged: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) attempt_number: i32,
    pub(crate) resumed: bool,
    pub(crate) time_remaining_seconds: i32,
    pub(crate) current_question_index: i32,
    pub(crate) total_questions: usize,
    pub(crate) questions: Vec<QuestionView>,
    pub(crate) anti_forgery_token: String,
    pub(crate) state_tick_interval_seconds: u64,
    pub(crate) started_at: String,
}

/// Answer as sent by the client. Everything is stored as text; choice sets
/// become comma-separated ordinals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum AnswerValue {
    Flag(bool),
    Number(serde_json::Number),
    Text(String),
    Choices(Vec<u32>),
}

impl AnswerValue {
    pub(crate) fn into_stored(self) -> String {
        match self {
            Self::Flag(value) => if value { "True" } else { "False" }.to_string(),
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value,
            Self::Choices(values) => {
                values.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(",")
            }
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[validate(length(min = 1, max = 255, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    pub(crate) answer_value: AnswerValue,
    pub(crate) anti_forgery_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveFlagRequest {
    #[validate(length(min = 1, max = 255, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    pub(crate) is_flagged: bool,
    pub(crate) anti_forgery_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveStateRequest {
    #[validate(range(min = 0, message = "time_remaining must be non-negative"))]
    pub(crate) time_remaining: i32,
    #[validate(range(min = 0, message = "current_question_index must be non-negative"))]
    pub(crate) current_question_index: i32,
    pub(crate) anti_forgery_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) answers: HashMap<String, Option<AnswerValue>>,
    #[serde(default)]
    pub(crate) timed_out: bool,
    pub(crate) anti_forgery_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TerminateRequest {
    #[validate(length(min = 1, max = 500, message = "reason must contain 1..500 characters"))]
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) answers: HashMap<String, Option<AnswerValue>>,
    pub(crate) anti_forgery_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StoreResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
}

impl StoreResponse {
    pub(crate) fn saved(message: &str) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub(crate) fn failed(message: &str) -> Self {
        Self { success: false, message: message.to_string() }
    }
}
