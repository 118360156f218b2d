//! Read-only access to the answer key catalog: tests and their questions.
//! Authoring happens elsewhere; nothing here writes.

use crate::db::models::{Question, Test};

const TEST_COLUMNS: &str = "\
    id, title, subject, class_name, academic_year, duration_minutes, \
    pass_percentage, created_at, updated_at";

const QUESTION_COLUMNS: &str = "\
    id, test_id, position, prompt, image_ref, answer_key, created_at, updated_at";

pub(crate) async fn find_test(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Question ids of the test's current pool in authoring order.
pub(crate) async fn list_question_ids(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM questions WHERE test_id = $1 ORDER BY position, id",
    )
    .bind(test_id)
    .fetch_all(executor)
    .await
}

/// Loads the given questions in no particular order; ids missing from the
/// catalog are silently absent from the result.
pub(crate) async fn list_questions_by_ids(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
}
