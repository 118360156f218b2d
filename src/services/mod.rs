pub(crate) mod attempt_timer;
pub(crate) mod grading;
pub(crate) mod question_set;
pub(crate) mod submission_finalize;
