//! Frozen question sets: chosen and shuffled once per attempt, then replayed
//! in the same order on every resume.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};

use crate::core::state::AppState;
use crate::db::models::{ExamAttempt, Question, QuestionResponse};
use crate::repositories;
use crate::schemas::attempt::{QuestionView, RenderedQuestion};

pub(crate) fn shuffled_order(mut question_ids: Vec<String>) -> Vec<String> {
    let mut rng = StdRng::from_entropy();
    question_ids.shuffle(&mut rng);
    question_ids
}

pub(crate) fn cache_key(attempt_id: &str) -> String {
    format!("attempt:{attempt_id}:questions")
}

/// Render data for the attempt's frozen order, served from Redis when cached.
pub(crate) async fn rendered_questions(
    state: &AppState,
    attempt: &ExamAttempt,
) -> Result<Vec<RenderedQuestion>> {
    let key = cache_key(&attempt.id);
    match state.redis().get_json::<Vec<RenderedQuestion>>(&key).await {
        Ok(Some(cached)) => return Ok(cached),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, attempt_id = %attempt.id, "Failed to read cached question set");
        }
    }

    let questions =
        repositories::catalog::list_questions_by_ids(state.db(), &attempt.question_order.0)
            .await
            .context("Failed to load frozen questions")?;
    let rendered = render_in_order(&attempt.question_order.0, &questions, &attempt.id);

    let ttl = state.settings().exam().question_cache_ttl_seconds;
    if let Err(err) = state.redis().set_json(&key, &rendered, ttl).await {
        tracing::warn!(error = %err, attempt_id = %attempt.id, "Failed to cache question set");
    }

    Ok(rendered)
}

pub(crate) async fn release_cache(state: &AppState, attempt_id: &str) {
    if let Err(err) = state.redis().delete(&cache_key(attempt_id)).await {
        tracing::warn!(error = %err, attempt_id, "Failed to release cached question set");
    }
}

fn render_in_order(
    frozen_order: &[String],
    questions: &[Question],
    attempt_id: &str,
) -> Vec<RenderedQuestion> {
    let by_id: HashMap<&str, &Question> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let rendered: Vec<RenderedQuestion> = frozen_order
        .iter()
        .filter_map(|question_id| by_id.get(question_id.as_str()))
        .map(|question| RenderedQuestion::from_question(question))
        .collect();

    if rendered.len() < frozen_order.len() {
        tracing::warn!(
            attempt_id,
            missing = frozen_order.len() - rendered.len(),
            "Frozen questions are missing from the catalog"
        );
    }

    rendered
}

/// Attaches the student's saved answer and flag to each rendered question.
pub(crate) fn merge_responses(
    rendered: Vec<RenderedQuestion>,
    responses: &[QuestionResponse],
) -> Vec<QuestionView> {
    let by_question: HashMap<&str, &QuestionResponse> =
        responses.iter().map(|response| (response.question_id.as_str(), response)).collect();

    rendered
        .into_iter()
        .map(|question| {
            let response = by_question.get(question.id.as_str());
            QuestionView {
                saved_answer: response.and_then(|response| response.answer_value.clone()),
                is_flagged: response.is_some_and(|response| response.is_flagged),
                question,
            }
        })
        .collect()
}
