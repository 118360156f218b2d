pub(crate) mod helpers;
mod finish;
mod start;
mod store;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/attempts", post(start::start_attempt))
        .route("/tests/:test_id/result", get(finish::get_my_result))
        .route("/attempts/:attempt_id/answers", post(store::save_answer))
        .route("/attempts/:attempt_id/flags", post(store::save_flag))
        .route("/attempts/:attempt_id/state", post(store::save_state))
        .route("/attempts/:attempt_id/submit", post(finish::submit_attempt))
        .route("/attempts/:attempt_id/terminate", post(finish::terminate_attempt))
}
