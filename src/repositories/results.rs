use time::PrimitiveDateTime;

use crate::db::models::ExamResult;
use crate::db::types::ResultStatus;

const COLUMNS: &str = "\
    id, student_id, test_id, attempt_id, score, total_questions, status, \
    reattempt_approved, created_at, updated_at";

pub(crate) struct RecordResult<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) status: ResultStatus,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn find_for_student_test(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {COLUMNS} FROM exam_results WHERE student_id = $1 AND test_id = $2"
    ))
    .bind(student_id)
    .bind(test_id)
    .fetch_optional(executor)
    .await
}

/// Records the outcome of a finished attempt. A later cycle replaces the
/// previous row and consumes any pending reattempt approval.
pub(crate) async fn record(
    executor: impl sqlx::PgExecutor<'_>,
    result: RecordResult<'_>,
) -> Result<ExamResult, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "INSERT INTO exam_results (
            id, student_id, test_id, attempt_id, score, total_questions, status,
            reattempt_approved, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,FALSE,$8,$8)
        ON CONFLICT (student_id, test_id) DO UPDATE SET
            attempt_id = EXCLUDED.attempt_id,
            score = EXCLUDED.score,
            total_questions = EXCLUDED.total_questions,
            status = EXCLUDED.status,
            reattempt_approved = FALSE,
            created_at = EXCLUDED.created_at,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(result.id)
    .bind(result.student_id)
    .bind(result.test_id)
    .bind(result.attempt_id)
    .bind(result.score)
    .bind(result.total_questions)
    .bind(result.status)
    .bind(result.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn approve_reattempt(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "UPDATE exam_results SET reattempt_approved = TRUE, updated_at = $1
         WHERE student_id = $2 AND test_id = $3
         RETURNING {COLUMNS}"
    ))
    .bind(now)
    .bind(student_id)
    .bind(test_id)
    .fetch_optional(executor)
    .await
}
