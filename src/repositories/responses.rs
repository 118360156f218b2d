use time::PrimitiveDateTime;

use crate::db::models::QuestionResponse;

const COLUMNS: &str = "student_id, test_id, question_id, answer_value, is_flagged, updated_at";

/// Writes the answer, leaving any flag on the same question untouched.
pub(crate) async fn save_answer(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
    question_id: &str,
    answer_value: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_responses
            (student_id, test_id, question_id, answer_value, is_flagged, updated_at)
         VALUES ($1, $2, $3, $4, FALSE, $5)
         ON CONFLICT (student_id, test_id, question_id) DO UPDATE
         SET answer_value = EXCLUDED.answer_value, updated_at = EXCLUDED.updated_at",
    )
    .bind(student_id)
    .bind(test_id)
    .bind(question_id)
    .bind(answer_value)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Writes the review flag, leaving any answer on the same question untouched.
pub(crate) async fn save_flag(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
    question_id: &str,
    is_flagged: bool,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_responses
            (student_id, test_id, question_id, answer_value, is_flagged, updated_at)
         VALUES ($1, $2, $3, NULL, $4, $5)
         ON CONFLICT (student_id, test_id, question_id) DO UPDATE
         SET is_flagged = EXCLUDED.is_flagged, updated_at = EXCLUDED.updated_at",
    )
    .bind(student_id)
    .bind(test_id)
    .bind(question_id)
    .bind(is_flagged)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_for_student_test(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<Vec<QuestionResponse>, sqlx::Error> {
    sqlx::query_as::<_, QuestionResponse>(&format!(
        "SELECT {COLUMNS} FROM question_responses WHERE student_id = $1 AND test_id = $2"
    ))
    .bind(student_id)
    .bind(test_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn delete_for_student_test(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM question_responses WHERE student_id = $1 AND test_id = $2")
            .bind(student_id)
            .bind(test_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected())
}
