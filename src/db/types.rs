use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Submitted,
    Terminated,
}

impl AttemptStatus {
    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "resultstatus", rename_all = "lowercase")]
pub(crate) enum ResultStatus {
    Pending,
    Passed,
    Failed,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    SingleChoice,
    MultiChoice,
    TrueFalse,
    FillBlank,
}

/// Correct-answer representation of a catalog question, stored as JSONB.
///
/// Choice ordinals are 1-based positions into `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum AnswerKey {
    SingleChoice {
        options: Vec<String>,
        correct_option: String,
    },
    MultiChoice {
        options: Vec<String>,
        correct_options: BTreeSet<u32>,
    },
    TrueFalse {
        correct: bool,
    },
    #[serde(alias = "short_answer")]
    FillBlank {
        correct_text: String,
    },
}

impl AnswerKey {
    pub(crate) fn kind(&self) -> QuestionKind {
        match self {
            Self::SingleChoice { .. } => QuestionKind::SingleChoice,
            Self::MultiChoice { .. } => QuestionKind::MultiChoice,
            Self::TrueFalse { .. } => QuestionKind::TrueFalse,
            Self::FillBlank { .. } => QuestionKind::FillBlank,
        }
    }

    /// Option texts a client may render; `None` for non-choice questions.
    pub(crate) fn options(&self) -> Option<&[String]> {
        match self {
            Self::SingleChoice { options, .. } | Self::MultiChoice { options, .. } => {
                Some(options)
            }
            Self::TrueFalse { .. } | Self::FillBlank { .. } => None,
        }
    }
}
