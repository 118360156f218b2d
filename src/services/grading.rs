//! Scoring of a finished attempt against the answer key catalog.
//!
//! Everything here is pure: callers load the frozen question order, the
//! answer keys and the answers, and get back a score. Totals always come from
//! the frozen order, so catalog edits after the attempt started cannot change
//! the denominator.

use std::collections::{BTreeSet, HashMap};

use crate::db::models::QuestionResponse;
use crate::db::types::{AnswerKey, ResultStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Score {
    pub(crate) correct: i32,
    pub(crate) total: i32,
}

/// Which way the attempt ended; decides whether a pass mark applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Submitted,
    Terminated,
}

pub(crate) fn is_correct(key: &AnswerKey, answer: Option<&str>) -> bool {
    let Some(answer) = answer.map(str::trim).filter(|answer| !answer.is_empty()) else {
        return false;
    };

    match key {
        AnswerKey::SingleChoice { options, correct_option } => {
            let Ok(ordinal) = answer.parse::<usize>() else {
                return false;
            };
            ordinal
                .checked_sub(1)
                .and_then(|index| options.get(index))
                .is_some_and(|chosen| normalize_text(chosen) == normalize_text(correct_option))
        }
        AnswerKey::MultiChoice { correct_options, .. } => {
            parse_ordinal_set(answer).is_some_and(|chosen| &chosen == correct_options)
        }
        AnswerKey::TrueFalse { correct } => {
            let expected = if *correct { "true" } else { "false" };
            normalize_text(answer) == expected
        }
        AnswerKey::FillBlank { correct_text } => {
            normalize_text(answer) == normalize_text(correct_text)
        }
    }
}

/// Scores `answers` over the frozen order. Questions without a key (removed
/// from the catalog) and unanswered questions score zero.
pub(crate) fn grade(
    frozen_order: &[String],
    keys: &HashMap<String, AnswerKey>,
    answers: &HashMap<String, String>,
) -> Score {
    let correct = frozen_order
        .iter()
        .filter(|question_id| {
            keys.get(question_id.as_str()).is_some_and(|key| {
                is_correct(key, answers.get(question_id.as_str()).map(String::as_str))
            })
        })
        .count();

    Score {
        correct: i32::try_from(correct).unwrap_or(i32::MAX),
        total: i32::try_from(frozen_order.len()).unwrap_or(i32::MAX),
    }
}

/// Submitted answers win; auto-saved responses fill whatever was not resent.
pub(crate) fn merge_answers(
    stored: &[QuestionResponse],
    submitted: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = stored
        .iter()
        .filter_map(|response| {
            response.answer_value.as_ref().map(|value| (response.question_id.clone(), value.clone()))
        })
        .collect();
    merged.extend(submitted);
    merged
}

pub(crate) fn result_status(
    score: Score,
    completion: Completion,
    pass_percentage: Option<u8>,
) -> ResultStatus {
    if completion == Completion::Terminated {
        return ResultStatus::Terminated;
    }
    let Some(pass_percentage) = pass_percentage else {
        return ResultStatus::Pending;
    };

    // Integer comparison of correct/total against pass/100.
    let reached = i64::from(score.correct) * 100;
    let required = i64::from(score.total) * i64::from(pass_percentage);
    if score.total > 0 && reached >= required {
        ResultStatus::Passed
    } else {
        ResultStatus::Failed
    }
}

fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

fn parse_ordinal_set(answer: &str) -> Option<BTreeSet<u32>> {
    let mut ordinals = BTreeSet::new();
    for part in answer.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        ordinals.insert(part.parse::<u32>().ok()?);
    }
    (!ordinals.is_empty()).then_some(ordinals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;

    fn single_choice(options: &[&str], correct: &str) -> AnswerKey {
        AnswerKey::SingleChoice {
            options: options.iter().map(|option| option.to_string()).collect(),
            correct_option: correct.to_string(),
        }
    }

    fn multi_choice(options: &[&str], correct: &[u32]) -> AnswerKey {
        AnswerKey::MultiChoice {
            options: options.iter().map(|option| option.to_string()).collect(),
            correct_options: correct.iter().copied().collect(),
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(id, value)| (id.to_string(), value.to_string())).collect()
    }

    #[test]
    fn single_choice_maps_ordinal_to_option_text() {
        let key = single_choice(&["London", "paris ", "Rome"], "Paris");

        assert!(is_correct(&key, Some("2")));
        assert!(is_correct(&key, Some(" 2 ")));
        assert!(!is_correct(&key, Some("1")));
        assert!(!is_correct(&key, Some("0")));
        assert!(!is_correct(&key, Some("4")));
        assert!(!is_correct(&key, Some("Paris")));
        assert!(!is_correct(&key, None));
    }

    #[test]
    fn multi_choice_requires_exact_set() {
        let key = multi_choice(&["2", "3", "4", "5"], &[1, 3]);

        assert!(is_correct(&key, Some("3,1")));
        assert!(is_correct(&key, Some("1, 3")));
        assert!(!is_correct(&key, Some("1,3,2")));
        assert!(!is_correct(&key, Some("1")));
        assert!(!is_correct(&key, Some("1,x")));
        assert!(!is_correct(&key, Some(",")));
    }

    #[test]
    fn true_false_ignores_case_and_whitespace() {
        let key = AnswerKey::TrueFalse { correct: true };

        assert!(is_correct(&key, Some("True")));
        assert!(is_correct(&key, Some("  TRUE ")));
        assert!(!is_correct(&key, Some("False")));
        assert!(!is_correct(&key, Some("yes")));
        assert!(is_correct(&AnswerKey::TrueFalse { correct: false }, Some("false")));
    }

    #[test]
    fn fill_blank_is_exact_after_normalization() {
        let key = AnswerKey::FillBlank { correct_text: "Photosynthesis".to_string() };

        assert!(is_correct(&key, Some(" photosynthesis ")));
        assert!(!is_correct(&key, Some("photosynthesys")));
        assert!(!is_correct(&key, Some("")));
    }

    #[test]
    fn mixed_attempt_scores_every_question_type() {
        let frozen = vec!["q1".to_string(), "q2".to_string(), "q3".to_string()];
        let keys = HashMap::from([
            ("q1".to_string(), single_choice(&["London", "Paris"], "Paris")),
            ("q2".to_string(), AnswerKey::TrueFalse { correct: true }),
            ("q3".to_string(), AnswerKey::FillBlank { correct_text: "42".to_string() }),
        ]);

        let score = grade(&frozen, &keys, &answers(&[("q1", "2"), ("q2", "True"), ("q3", "42")]));

        assert_eq!(score, Score { correct: 3, total: 3 });
    }

    #[test]
    fn total_follows_frozen_order_not_catalog() {
        let frozen = vec!["q1".to_string(), "q2".to_string(), "gone".to_string()];
        let keys = HashMap::from([
            ("q1".to_string(), AnswerKey::TrueFalse { correct: false }),
            ("q2".to_string(), AnswerKey::FillBlank { correct_text: "x".to_string() }),
            ("added-later".to_string(), AnswerKey::TrueFalse { correct: true }),
        ]);

        let score = grade(
            &frozen,
            &keys,
            &answers(&[("q1", "False"), ("gone", "anything"), ("added-later", "True")]),
        );

        assert_eq!(score, Score { correct: 1, total: 3 });
    }

    #[test]
    fn submitted_answers_override_stored_responses() {
        let now = primitive_now_utc();
        let stored = vec![
            QuestionResponse {
                student_id: "s".into(),
                test_id: "t".into(),
                question_id: "q1".into(),
                answer_value: Some("1".into()),
                is_flagged: false,
                updated_at: now,
            },
            QuestionResponse {
                student_id: "s".into(),
                test_id: "t".into(),
                question_id: "q2".into(),
                answer_value: Some("False".into()),
                is_flagged: true,
                updated_at: now,
            },
            QuestionResponse {
                student_id: "s".into(),
                test_id: "t".into(),
                question_id: "q3".into(),
                answer_value: None,
                is_flagged: true,
                updated_at: now,
            },
        ];

        let merged = merge_answers(&stored, answers(&[("q1", "2")]));

        assert_eq!(merged.get("q1").map(String::as_str), Some("2"));
        assert_eq!(merged.get("q2").map(String::as_str), Some("False"));
        assert!(!merged.contains_key("q3"));
    }

    #[test]
    fn result_status_applies_pass_mark() {
        let score = Score { correct: 3, total: 5 };

        assert_eq!(result_status(score, Completion::Submitted, Some(60)), ResultStatus::Passed);
        assert_eq!(result_status(score, Completion::Submitted, Some(61)), ResultStatus::Failed);
        assert_eq!(result_status(score, Completion::Submitted, None), ResultStatus::Pending);
        assert_eq!(
            result_status(score, Completion::Terminated, Some(0)),
            ResultStatus::Terminated
        );
        assert_eq!(
            result_status(Score { correct: 0, total: 0 }, Completion::Submitted, Some(0)),
            ResultStatus::Failed
        );
    }
}
