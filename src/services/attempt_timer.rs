use crate::core::config::{ExamSettings, ResumeTimerPolicy};
use crate::db::models::Test;

/// Full time budget of a test in seconds, falling back to the configured
/// default duration when the test has none.
pub(crate) fn duration_seconds(test: &Test, exam: &ExamSettings) -> i32 {
    let minutes = match test.duration_minutes.filter(|minutes| *minutes > 0) {
        Some(minutes) => i64::from(minutes),
        None => {
            tracing::warn!(
                test_id = %test.id,
                default_minutes = exam.default_test_duration_minutes,
                "Test has no duration configured; using default"
            );
            i64::from(exam.default_test_duration_minutes)
        }
    };

    i32::try_from(minutes * 60).unwrap_or(i32::MAX)
}

/// Remaining time handed back to a student who resumes an in-progress attempt.
pub(crate) fn resumed_seconds(
    stored_seconds: i32,
    test: &Test,
    exam: &ExamSettings,
    attempt_id: &str,
) -> i32 {
    let stored_seconds = stored_seconds.max(0);
    match exam.resume_timer_policy {
        ResumeTimerPolicy::Stored => stored_seconds,
        ResumeTimerPolicy::MaxOfDuration => {
            let full = duration_seconds(test, exam);
            if full > stored_seconds {
                tracing::warn!(
                    attempt_id,
                    stored_seconds,
                    restored_seconds = full,
                    "Resume restored the full test duration (max_of_duration policy)"
                );
                full
            } else {
                stored_seconds
            }
        }
    }
}
