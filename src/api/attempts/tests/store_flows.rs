use axum::http::{Method, StatusCode};
use serde_json::json;

use super::{attempt_id, count_rows, seed, send, start, submit, Seeded};
use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support::{self, TestContext};

async fn save_answer(
    ctx: &TestContext,
    seeded: &Seeded,
    attempt_id: &str,
    question_id: &str,
    value: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(
        ctx,
        Method::POST,
        &format!("/api/v1/attempts/{attempt_id}/answers"),
        &seeded.token,
        Some(json!({
            "question_id": question_id,
            "answer_value": value,
            "anti_forgery_token": seeded.anti_forgery,
        })),
    )
    .await
}

async fn save_flag(
    ctx: &TestContext,
    seeded: &Seeded,
    attempt_id: &str,
    question_id: &str,
    is_flagged: bool,
) -> (StatusCode, serde_json::Value) {
    send(
        ctx,
        Method::POST,
        &format!("/api/v1/attempts/{attempt_id}/flags"),
        &seeded.token,
        Some(json!({
            "question_id": question_id,
            "is_flagged": is_flagged,
            "anti_forgery_token": seeded.anti_forgery,
        })),
    )
    .await
}

async fn stored(
    ctx: &TestContext,
    seeded: &Seeded,
) -> Vec<crate::db::models::QuestionResponse> {
    repositories::responses::list_for_student_test(
        ctx.state.db(),
        &seeded.student.id,
        &seeded.test.id,
    )
    .await
    .expect("responses")
}

#[tokio::test]
async fn saving_an_answer_twice_keeps_one_row_with_latest_value() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    let (status, body) = save_answer(&ctx, &seeded, &id, &seeded.answer.id, json!("41")).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], true);
    let (status, _) = save_answer(&ctx, &seeded, &id, &seeded.answer.id, json!("42")).await;
    assert_eq!(status, StatusCode::OK);

    let rows = stored(&ctx, &seeded).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].answer_value.as_deref(), Some("42"));
    assert!(!rows[0].is_flagged);
}

#[tokio::test]
async fn flag_and_answer_do_not_overwrite_each_other() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    // Flag first, then answer.
    let (status, body) = save_flag(&ctx, &seeded, &id, &seeded.truth.id, true).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    save_answer(&ctx, &seeded, &id, &seeded.truth.id, json!(true)).await;

    // Answer first, then flag, then unflag.
    save_answer(&ctx, &seeded, &id, &seeded.capital.id, json!(2)).await;
    save_flag(&ctx, &seeded, &id, &seeded.capital.id, true).await;
    save_flag(&ctx, &seeded, &id, &seeded.capital.id, false).await;

    let rows = stored(&ctx, &seeded).await;
    assert_eq!(rows.len(), 2);
    let truth = rows.iter().find(|row| row.question_id == seeded.truth.id).expect("truth row");
    assert_eq!(truth.answer_value.as_deref(), Some("True"));
    assert!(truth.is_flagged);
    let capital =
        rows.iter().find(|row| row.question_id == seeded.capital.id).expect("capital row");
    assert_eq!(capital.answer_value.as_deref(), Some("2"));
    assert!(!capital.is_flagged);
}

#[tokio::test]
async fn resume_shows_saved_answers_and_flags() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    save_answer(&ctx, &seeded, &id, &seeded.answer.id, json!("42")).await;
    save_flag(&ctx, &seeded, &id, &seeded.capital.id, true).await;

    let resumed = start(&ctx, &seeded).await;
    let questions = resumed["questions"].as_array().expect("questions");
    let find = |question_id: &str| {
        questions.iter().find(|question| question["id"] == question_id).expect("question").clone()
    };

    let answer = find(seeded.answer.id.as_str());
    assert_eq!(answer["saved_answer"], "42");
    assert_eq!(answer["is_flagged"], false);
    let capital = find(seeded.capital.id.as_str());
    assert_eq!(capital["saved_answer"], serde_json::Value::Null);
    assert_eq!(capital["is_flagged"], true);
}

#[tokio::test]
async fn invalid_anti_forgery_token_is_rejected_without_writing() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    let (status, _) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/attempts/{id}/answers"),
        &seeded.token,
        Some(json!({
            "question_id": seeded.answer.id,
            "answer_value": "42",
            "anti_forgery_token": "forged",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/attempts/{id}/submit"),
        &seeded.token,
        Some(json!({ "answers": {}, "anti_forgery_token": "forged" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(stored(&ctx, &seeded).await.is_empty());
    assert_eq!(count_rows(&ctx, "exam_results", &seeded.student.id).await, 0);
}

#[tokio::test]
async fn question_outside_the_attempt_is_rejected() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    let (status, _) = save_answer(&ctx, &seeded, &id, "not-in-attempt", json!("x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = save_flag(&ctx, &seeded, &id, "not-in-attempt", true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(stored(&ctx, &seeded).await.is_empty());
}

#[tokio::test]
async fn save_state_validates_and_stops_after_submit() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);
    let uri = format!("/api/v1/attempts/{id}/state");
    let tick = |time_remaining: i32, index: i32| {
        json!({
            "time_remaining": time_remaining,
            "current_question_index": index,
            "anti_forgery_token": seeded.anti_forgery,
        })
    };

    let (status, _) = send(&ctx, Method::POST, &uri, &seeded.token, Some(tick(-1, 0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&ctx, Method::POST, &uri, &seeded.token, Some(tick(100, 3))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&ctx, Method::POST, &uri, &seeded.token, Some(tick(100, 1))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let attempt = repositories::attempts::find_by_id(ctx.state.db(), &id)
        .await
        .expect("attempt query")
        .expect("attempt");
    assert_eq!(attempt.time_remaining_seconds, 100);
    assert_eq!(attempt.current_question_index, 1);

    let (status, _) = submit(&ctx, &seeded, &id, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&ctx, Method::POST, &uri, &seeded.token, Some(tick(90, 1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = save_answer(&ctx, &seeded, &id, &seeded.answer.id, json!("42")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn another_students_attempt_is_forbidden() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    let intruder = test_support::insert_user(ctx.state.db(), "Eve", UserRole::Student).await;
    let token = test_support::bearer_token(&intruder.id, ctx.state.settings());
    let anti_forgery = test_support::anti_forgery(&token, ctx.state.settings());

    let (status, _) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/attempts/{id}/answers"),
        &token,
        Some(json!({
            "question_id": seeded.answer.id,
            "answer_value": "1",
            "anti_forgery_token": anti_forgery,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(stored(&ctx, &seeded).await.is_empty());
}

#[tokio::test]
async fn anti_forgery_token_from_an_earlier_session_is_rejected() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    let later_token = test_support::bearer_token(&seeded.student.id, ctx.state.settings());
    let uri = format!("/api/v1/attempts/{id}/answers");
    let answer = |anti_forgery: &str| {
        json!({
            "question_id": seeded.answer.id,
            "answer_value": "42",
            "anti_forgery_token": anti_forgery,
        })
    };

    let (status, _) = send(
        &ctx,
        Method::POST,
        &uri,
        &later_token,
        Some(answer(seeded.anti_forgery.as_str())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(stored(&ctx, &seeded).await.is_empty());

    let (status, resumed) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/tests/{}/attempts", seeded.test.id),
        &later_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let later_anti_forgery = resumed["anti_forgery_token"].as_str().expect("token").to_string();
    assert_ne!(later_anti_forgery, seeded.anti_forgery);

    let (status, body) =
        send(&ctx, Method::POST, &uri, &later_token, Some(answer(&later_anti_forgery))).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(stored(&ctx, &seeded).await.len(), 1);
}

#[tokio::test]
async fn malformed_answer_value_is_a_bad_request() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);

    let (status, body) =
        save_answer(&ctx, &seeded, &id, &seeded.capital.id, json!(["2"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["detail"].as_str().expect("detail").contains("answer_value"), "{body}");

    let (status, body) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/attempts/{id}/state"),
        &seeded.token,
        Some(json!({ "time_remaining": "soon", "anti_forgery_token": seeded.anti_forgery })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    assert!(stored(&ctx, &seeded).await.is_empty());
}

#[tokio::test]
async fn timer_ticks_cannot_extend_the_attempt() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };
    let seeded = seed(&ctx).await;
    let id = attempt_id(&start(&ctx, &seeded).await);
    let uri = format!("/api/v1/attempts/{id}/state");
    let tick = |time_remaining: i32, index: i32| {
        json!({
            "time_remaining": time_remaining,
            "current_question_index": index,
            "anti_forgery_token": seeded.anti_forgery,
        })
    };

    let (status, _) = send(&ctx, Method::POST, &uri, &seeded.token, Some(tick(600, 0))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&ctx, Method::POST, &uri, &seeded.token, Some(tick(5000, 2))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let attempt = repositories::attempts::find_by_id(ctx.state.db(), &id)
        .await
        .expect("attempt query")
        .expect("attempt");
    assert_eq!(attempt.time_remaining_seconds, 600);
    assert_eq!(attempt.current_question_index, 2);
}
