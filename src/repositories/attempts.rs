use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamAttempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, student_id, test_id, attempt_number, question_order, time_remaining_seconds, \
    current_question_index, status, reattempt_approved, termination_reason, \
    started_at, last_saved_at, finished_at, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) question_order: &'a [String],
    pub(crate) time_remaining_seconds: i32,
    pub(crate) reattempt_approved: bool,
    pub(crate) now: PrimitiveDateTime,
}

/// Serializes attempt creation for one (student, test) until the surrounding
/// transaction ends.
pub(crate) async fn lock_student_test(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("exam-attempt:{student_id}:{test_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!("SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_in_progress(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts \
         WHERE student_id = $1 AND test_id = $2 AND status = $3"
    ))
    .bind(student_id)
    .bind(test_id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn latest_attempt_number(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(attempt_number), 0) FROM exam_attempts \
         WHERE student_id = $1 AND test_id = $2",
    )
    .bind(student_id)
    .bind(test_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<ExamAttempt, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "INSERT INTO exam_attempts (
            id, student_id, test_id, attempt_number, question_order, time_remaining_seconds,
            current_question_index, status, reattempt_approved, started_at, last_saved_at,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,0,$7,$8,$9,$9,$9,$9)
        RETURNING {COLUMNS}"
    ))
    .bind(attempt.id)
    .bind(attempt.student_id)
    .bind(attempt.test_id)
    .bind(attempt.attempt_number)
    .bind(Json(attempt.question_order))
    .bind(attempt.time_remaining_seconds)
    .bind(AttemptStatus::InProgress)
    .bind(attempt.reattempt_approved)
    .bind(attempt.now)
    .fetch_one(executor)
    .await
}

/// Records a resume. The stored timer only moves when the resume policy
/// computed a different value.
pub(crate) async fn record_resume(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    time_remaining_seconds: i32,
    now: PrimitiveDateTime,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "UPDATE exam_attempts
         SET time_remaining_seconds = $1, last_saved_at = $2, updated_at = $2
         WHERE id = $3 AND status = $4
         RETURNING {COLUMNS}"
    ))
    .bind(time_remaining_seconds)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

/// Persists the client's timer and position. Returns false when the attempt
/// is no longer in progress.
pub(crate) async fn save_state(
    pool: &PgPool,
    id: &str,
    time_remaining_seconds: i32,
    current_question_index: i32,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts
         SET time_remaining_seconds = LEAST(time_remaining_seconds, $1),
             current_question_index = $2,
             last_saved_at = $3, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(time_remaining_seconds)
    .bind(current_question_index)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Moves an in-progress attempt to a terminal status. `None` means another
/// caller already finished it.
pub(crate) async fn finish(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: AttemptStatus,
    termination_reason: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "UPDATE exam_attempts
         SET status = $1, termination_reason = $2, finished_at = $3, updated_at = $3
         WHERE id = $4 AND status = $5
         RETURNING {COLUMNS}"
    ))
    .bind(status)
    .bind(termination_reason)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}

/// In-progress attempts whose last saved timer ran out more than
/// `grace_seconds` ago.
pub(crate) async fn list_abandoned(
    pool: &PgPool,
    now: PrimitiveDateTime,
    grace_seconds: i64,
    limit: i64,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts
         WHERE status = $1
           AND last_saved_at + make_interval(secs => (time_remaining_seconds + $2)::double precision) < $3
         ORDER BY last_saved_at
         LIMIT $4"
    ))
    .bind(AttemptStatus::InProgress)
    .bind(grace_seconds)
    .bind(now)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
