use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::db::models::{Category, Question, Test};
use crate::db::types::{QuestionType, ScoringMode};
use crate::test_support::{self, NewQuestion, NewTest, TestContext};

async fn send(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, token, body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

struct TwoCategoryTest {
    test: Test,
    first: Category,
    second: Category,
    q1: Question,
    q2: Question,
    q3: Question,
}

/// Point-scored test: category one holds q1 (4 points, key "b") and q2
/// (2 points, key "a"); category two holds q3 (3 points, key "c").
async fn two_category_test(ctx: &TestContext, params: NewTest) -> TwoCategoryTest {
    let pool = ctx.state.db();
    let test = test_support::insert_test(pool, "Tryout UTBK", params).await;
    let first = test_support::insert_category(pool, &test, "Verbal", 1, Some(600)).await;
    let second = test_support::insert_category(pool, &test, "Numeric", 2, Some(600)).await;
    let q1 = test_support::insert_question(pool, &first, NewQuestion::choice("b", 4.0, 1)).await;
    let q2 = test_support::insert_question(pool, &first, NewQuestion::choice("a", 2.0, 2)).await;
    let q3 = test_support::insert_question(pool, &second, NewQuestion::choice("c", 3.0, 1)).await;
    TwoCategoryTest { test, first, second, q1, q2, q3 }
}

async fn generate(ctx: &TestContext, token: &str, test: &Test) -> String {
    let (status, body) = send(
        ctx,
        Method::POST,
        "/api/v1/tryout/generate",
        Some(token),
        Some(json!({ "test_id": test.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().expect("session id").to_string()
}

async fn save(
    ctx: &TestContext,
    token: &str,
    session_id: &str,
    question: &Question,
    answer: &str,
) -> (StatusCode, Value) {
    send(
        ctx,
        Method::PUT,
        &format!("/api/v1/tryout/save-answer/{session_id}"),
        Some(token),
        Some(json!({
            "question_id": question.id,
            "type": question.question_type,
            "answer": answer,
        })),
    )
    .await
}

#[tokio::test]
async fn participant_completes_two_category_tryout() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest { pass_grade: 6.0, ..NewTest::default() }).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());

    let session_id = generate(&ctx, &token, &setup.test).await;

    let (status, body) =
        send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
            .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["category"]["id"], setup.first.id.as_str());
    assert_eq!(body["data"]["category"]["remaining_seconds"], 600);
    assert_eq!(body["data"]["participant_test"]["is_started"], true);
    let groups = body["data"]["questions"].as_array().expect("groups");
    assert_eq!(groups.len(), 2);
    assert!(groups[0]["questions"][0].get("correct_answer").is_none());
    assert!(groups[0]["questions"][0].get("explanation").is_none());

    let (status, body) = save(&ctx, &token, &session_id, &setup.q1, "B").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["is_correct"], true);
    assert_eq!(body["data"]["point"], 4.0);

    // A retried save does not accumulate anything.
    let (status, _) = save(&ctx, &token, &session_id, &setup.q1, "b").await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = save(&ctx, &token, &session_id, &setup.q2, "c").await;
    assert_eq!(body["data"]["is_correct"], false);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-category/{session_id}/{}", setup.first.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["next_category"]["category"]["id"], setup.second.id.as_str());

    let (status, _) = save(&ctx, &token, &session_id, &setup.q3, "c").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-category/{session_id}/{}", setup.second.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["id"], session_id.as_str());
    assert!(body["data"]["end_date"].is_null());

    let (status, body) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/active-category/{session_id}"), Some(&token), None)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-session/{session_id}"),
        Some(&token),
        Some(json!({ "reason": "submitted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["grade"], 7.0);
    assert_eq!(body["data"]["is_passed"], true);
    assert_eq!(body["data"]["end_reason"], "submitted");
    let ended_at = body["data"]["end_date"].clone();
    assert!(ended_at.is_string());

    // Ending twice returns the stored session unchanged.
    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-session/{session_id}"),
        Some(&token),
        Some(json!({ "reason": "violation" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["end_reason"], "submitted");
    assert_eq!(body["data"]["end_date"], ended_at);

    let (status, body) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/result/{session_id}"), Some(&token), None)
            .await;
    assert_eq!(status, StatusCode::OK);
    let categories = body["data"]["categories"].as_array().expect("categories");
    assert_eq!(categories[0]["grade"], 4.0);
    assert_eq!(categories[1]["grade"], 3.0);
    let review = body["data"]["review"].as_array().expect("review");
    assert_eq!(review.len(), 3);
    assert_eq!(review[0]["correct_answer"], "b");
}

#[tokio::test]
async fn second_generate_while_ongoing_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());

    let session_id = generate(&ctx, &token, &setup.test).await;
    let (status, body) = send(
        &ctx,
        Method::POST,
        "/api/v1/tryout/generate",
        Some(&token),
        Some(json!({ "test_id": setup.test.id })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_ongoing");
    assert_eq!(body["participant_test_id"], session_id.as_str());
}

#[tokio::test]
async fn attempt_limit_is_enforced() {
    let ctx = test_support::setup_test_context().await;
    let setup =
        two_category_test(&ctx, NewTest { max_attempts: Some(1), ..NewTest::default() }).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());

    let session_id = generate(&ctx, &token, &setup.test).await;
    let (status, _) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-session/{session_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/api/v1/tryout/generate",
        Some(&token),
        Some(json!({ "test_id": setup.test.id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "attempt_limit_exceeded");
}

#[tokio::test]
async fn categories_are_taken_in_order() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/continue/{session_id}/{}", setup.second.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (_, first) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/continue/{session_id}/{}", setup.first.id),
        Some(&token),
        None,
    )
    .await;
    let (_, resumed) =
        send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
            .await;
    assert_eq!(
        first["data"]["category"]["participant_category_id"],
        resumed["data"]["category"]["participant_category_id"]
    );

    // Answers only land in the active category.
    let (status, body) = save(&ctx, &token, &session_id, &setup.q3, "c").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    let end_first = format!("/api/v1/tryout/end-category/{session_id}/{}", setup.first.id);
    let (status, _) = send(&ctx, Method::PUT, &end_first, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&ctx, Method::PUT, &end_first, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/continue/{session_id}/{}", setup.first.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn continue_after_last_category_requires_end_session() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let test = test_support::insert_test(pool, "Single", NewTest::default()).await;
    let only = test_support::insert_category(pool, &test, "Only", 1, None).await;
    test_support::insert_question(pool, &only, NewQuestion::choice("a", 1.0, 1)).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &test).await;

    let continue_uri = format!("/api/v1/tryout/continue/{session_id}");
    let (_, body) = send(&ctx, Method::PUT, &continue_uri, Some(&token), None).await;
    assert!(body["data"]["category"]["remaining_seconds"].is_null());
    let (status, _) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-category/{session_id}/{}", only.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&ctx, Method::PUT, &continue_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn answer_validation_and_lookup_errors() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
        .await;

    let uri = format!("/api/v1/tryout/save-answer/{session_id}");
    let (status, body) = send(
        &ctx,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "question_id": setup.q1.id, "type": "essay", "answer": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = save(&ctx, &token, &session_id, &setup.q1, "z").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, _) = save(&ctx, &token, &session_id, &setup.q1, " , ").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "question_id": "missing", "type": "multiple_choice", "answer": "a" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = send(
        &ctx,
        Method::PUT,
        "/api/v1/tryout/continue/does-not-exist",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Session not found");
}

#[tokio::test]
async fn flag_and_reset_keep_ledger_consistent() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
        .await;

    let reset_uri = format!("/api/v1/tryout/reset-answer/{session_id}");
    let (status, body) = send(
        &ctx,
        Method::PUT,
        &reset_uri,
        Some(&token),
        Some(json!({ "question_id": setup.q2.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user_answer"].is_null());
    let stored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM participant_answers WHERE participant_test_id = $1")
            .bind(&session_id)
            .fetch_one(ctx.state.db())
            .await
            .expect("count");
    assert_eq!(stored, 0);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/flag-question/{session_id}"),
        Some(&token),
        Some(json!({ "question_id": setup.q1.id, "is_flagged": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_flagged"], true);
    assert!(body["data"]["user_answer"].is_null());

    let (_, body) = save(&ctx, &token, &session_id, &setup.q1, "b").await;
    assert_eq!(body["data"]["is_flagged"], true);
    assert_eq!(body["data"]["point"], 4.0);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &reset_uri,
        Some(&token),
        Some(json!({ "question_id": setup.q1.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user_answer"].is_null());
    assert!(body["data"]["point"].is_null());
    assert_eq!(body["data"]["is_flagged"], true);
}

#[tokio::test]
async fn expired_category_rejects_answers_but_can_be_ended() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
        .await;

    test_support::rewind_session_clock(ctx.state.db(), &session_id, 601).await;

    let (status, body) = save(&ctx, &token, &session_id, &setup.q1, "b").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    let (status, body) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/timer/{session_id}"), Some(&token), None)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_expired"], true);
    assert_eq!(body["data"]["timer_type"], "per_category");
    assert_eq!(body["data"]["category_id"], setup.first.id.as_str());
    assert!(body["data"]["remaining_seconds"].as_i64().is_some_and(|seconds| seconds <= 0));

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-category/{session_id}/{}", setup.first.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["next_category"]["category"]["remaining_seconds"], 600);
}

#[tokio::test]
async fn per_test_timer_is_shared_between_categories() {
    let ctx = test_support::setup_test_context().await;
    let params = NewTest {
        timer_type: crate::db::types::TimerType::PerTest,
        total_time: Some(1800),
        ..NewTest::default()
    };
    let setup = two_category_test(&ctx, params).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
        .await;

    test_support::rewind_session_clock(ctx.state.db(), &session_id, 1000).await;

    let (_, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-category/{session_id}/{}", setup.first.id),
        Some(&token),
        None,
    )
    .await;
    let remaining = body["data"]["next_category"]["category"]["remaining_seconds"]
        .as_i64()
        .expect("remaining");
    assert!((795..=800).contains(&remaining), "remaining = {remaining}");

    test_support::rewind_session_clock(ctx.state.db(), &session_id, 801).await;
    let (status, _) = save(&ctx, &token, &session_id, &setup.q3, "c").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-session/{session_id}"),
        Some(&token),
        Some(json!({ "reason": "time_expired" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["end_reason"], "time_expired");

    let (_, body) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/result/{session_id}"), Some(&token), None)
            .await;
    let categories = body["data"]["categories"].as_array().expect("categories");
    assert!(categories.iter().all(|category| category["end_date"].is_string()));
}

#[tokio::test]
async fn sessions_are_private_to_their_owner() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let owner = test_support::bearer_token("student-1", ctx.state.settings());
    let intruder = test_support::bearer_token("student-2", ctx.state.settings());
    let session_id = generate(&ctx, &owner, &setup.test).await;

    let (status, body) =
        send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&intruder), None)
            .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/result/{session_id}"), Some(&intruder), None)
            .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn essay_keeps_pass_status_open_until_graded() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let test = test_support::insert_test(
        pool,
        "Essay tryout",
        NewTest { pass_grade: 5.0, is_result_released: false, ..NewTest::default() },
    )
    .await;
    let category = test_support::insert_category(pool, &test, "Writing", 1, None).await;
    let essay = test_support::insert_question(pool, &category, NewQuestion::essay(10.0, 1)).await;
    assert_eq!(essay.question_type, QuestionType::Essay);

    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let admin = test_support::admin_token("admin-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
        .await;

    let (status, body) = save(&ctx, &token, &session_id, &essay, "Panjang, lebar, dan tinggi").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["point"].is_null());

    let (_, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-session/{session_id}"),
        Some(&token),
        None,
    )
    .await;
    assert!(body["data"]["is_passed"].is_null());
    assert_eq!(body["data"]["grade"], 0.0);

    let grade_uri = format!("/api/v1/tryout/grade-essay/{session_id}");
    let (status, _) = send(
        &ctx,
        Method::PUT,
        &grade_uri,
        Some(&token),
        Some(json!({ "question_id": essay.id, "point": 8.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &ctx,
        Method::PUT,
        &grade_uri,
        Some(&admin),
        Some(json!({ "question_id": essay.id, "point": 11.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &grade_uri,
        Some(&admin),
        Some(json!({ "question_id": essay.id, "point": 8.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["is_correct"], true);

    let (_, body) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/result/{session_id}"), Some(&token), None)
            .await;
    assert_eq!(body["data"]["participant_test"]["grade"], 8.0);
    assert_eq!(body["data"]["participant_test"]["is_passed"], true);
    assert_eq!(body["data"]["categories"][0]["grade"], 8.0);
    assert!(body["data"]["review"].is_null());
}

#[tokio::test]
async fn irt_scoring_reports_scaled_grade() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(
        &ctx,
        NewTest { scoring_mode: ScoringMode::Irt, pass_grade: 500.0, ..NewTest::default() },
    )
    .await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/continue/{session_id}"), Some(&token), None)
        .await;
    save(&ctx, &token, &session_id, &setup.q1, "b").await;
    save(&ctx, &token, &session_id, &setup.q2, "a").await;

    let (_, body) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/tryout/end-session/{session_id}"),
        Some(&token),
        None,
    )
    .await;

    // Category one is all correct (900), category two was never entered (100).
    assert_eq!(body["data"]["grade"], 500.0);
    assert_eq!(body["data"]["is_passed"], true);
    assert_eq!(body["data"]["end_reason"], "submitted");
}

#[tokio::test]
async fn history_is_paginated_and_scoped_to_caller() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let other = two_category_test(&ctx, NewTest::default()).await;
    let alice = test_support::bearer_token("alice", ctx.state.settings());
    let bob = test_support::bearer_token("bob", ctx.state.settings());
    let admin = test_support::admin_token("admin-1", ctx.state.settings());

    let finished = generate(&ctx, &alice, &setup.test).await;
    send(&ctx, Method::PUT, &format!("/api/v1/tryout/end-session/{finished}"), Some(&alice), None)
        .await;
    generate(&ctx, &alice, &other.test).await;
    generate(&ctx, &bob, &setup.test).await;

    let (status, body) = send(
        &ctx,
        Method::GET,
        "/api/v1/tryout/history-test?user_id=bob&per_page=1",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["per_page"], 1);
    assert_eq!(body["data"]["last_page"], 2);
    assert_eq!(body["data"]["current_page"], 1);
    assert_eq!(body["data"]["data"][0]["user_id"], "alice");

    let (_, body) = send(
        &ctx,
        Method::GET,
        "/api/v1/tryout/history-test?is_completed=true",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["id"], finished.as_str());

    let (_, body) =
        send(&ctx, Method::GET, "/api/v1/tryout/history-test?is_ongoing=true", Some(&admin), None)
            .await;
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = send(
        &ctx,
        Method::GET,
        &format!("/api/v1/tryout/history-test?test_id={}", setup.test.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn shuffled_order_is_stable_for_a_participant() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let test = test_support::insert_test(
        pool,
        "Shuffled",
        NewTest { is_shuffle: true, ..NewTest::default() },
    )
    .await;
    let category = test_support::insert_category(pool, &test, "Mixed", 1, None).await;
    let group = test_support::insert_group(pool, &category, 0, "Passage").await;
    for order in 1..=8 {
        test_support::insert_question(pool, &category, NewQuestion::choice("a", 1.0, order)).await;
    }
    for order in 1..=2 {
        let mut params: NewQuestion<'_> = NewQuestion::choice("a", 1.0, order);
        params.group_id = Some(group.id.as_str());
        test_support::insert_question(pool, &category, params).await;
    }
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &test).await;

    let uri = format!("/api/v1/tryout/continue/{session_id}");
    let (_, first) = send(&ctx, Method::PUT, &uri, Some(&token), None).await;
    let (_, second) = send(&ctx, Method::PUT, &uri, Some(&token), None).await;

    let groups = first["data"]["questions"].as_array().expect("groups");
    assert_eq!(groups.len(), 9);
    assert_eq!(first["data"]["questions"], second["data"]["questions"]);
    let grouped = groups
        .iter()
        .find(|unit| unit["id"] == group.id.as_str())
        .expect("passage group");
    assert_eq!(grouped["stimulus"], "Passage");
    assert_eq!(grouped["questions"].as_array().map(Vec::len), Some(2));
}

async fn open_categories(ctx: &TestContext, session_id: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM participant_question_categories \
         WHERE participant_test_id = $1 AND start_date IS NOT NULL AND end_date IS NULL",
    )
    .bind(session_id)
    .fetch_one(ctx.state.db())
    .await
    .expect("count")
}

#[tokio::test]
async fn double_submitted_transitions_apply_once() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;

    let continue_uri = format!("/api/v1/tryout/continue/{session_id}");
    let ((first_status, first), (second_status, second)) = tokio::join!(
        send(&ctx, Method::PUT, &continue_uri, Some(&token), None),
        send(&ctx, Method::PUT, &continue_uri, Some(&token), None),
    );
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(
        first["data"]["category"]["participant_category_id"],
        second["data"]["category"]["participant_category_id"]
    );
    assert_eq!(open_categories(&ctx, &session_id).await, 1);

    let end_uri = format!("/api/v1/tryout/end-category/{session_id}/{}", setup.first.id);
    let ((first_status, first), (second_status, second)) = tokio::join!(
        send(&ctx, Method::PUT, &end_uri, Some(&token), None),
        send(&ctx, Method::PUT, &end_uri, Some(&token), None),
    );
    let mut statuses = [first_status, second_status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
    let (winner, loser) = if first_status == StatusCode::OK { (first, second) } else { (second, first) };
    assert_eq!(winner["data"]["next_category"]["category"]["id"], setup.second.id.as_str());
    assert_eq!(loser["error"], "invalid_state");
    assert_eq!(open_categories(&ctx, &session_id).await, 1);

    let end_session_uri = format!("/api/v1/tryout/end-session/{session_id}");
    let ((first_status, first), (second_status, second)) = tokio::join!(
        send(&ctx, Method::PUT, &end_session_uri, Some(&token), None),
        send(&ctx, Method::PUT, &end_session_uri, Some(&token), None),
    );
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["data"]["end_date"], second["data"]["end_date"]);
    assert_eq!(first["data"]["grade"], second["data"]["grade"]);
    assert_eq!(open_categories(&ctx, &session_id).await, 0);

    let finalized: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM participant_tests WHERE id = $1 AND end_date IS NOT NULL",
    )
    .bind(&session_id)
    .fetch_one(ctx.state.db())
    .await
    .expect("count");
    assert_eq!(finalized, 1);
}

#[tokio::test]
async fn participants_cannot_report_abandonment() {
    let ctx = test_support::setup_test_context().await;
    let setup = two_category_test(&ctx, NewTest::default()).await;
    let token = test_support::bearer_token("student-1", ctx.state.settings());
    let admin = test_support::admin_token("admin-1", ctx.state.settings());
    let session_id = generate(&ctx, &token, &setup.test).await;
    let uri = format!("/api/v1/tryout/end-session/{session_id}");

    for caller in [&token, &admin] {
        let (status, body) = send(
            &ctx,
            Method::PUT,
            &uri,
            Some(caller),
            Some(json!({ "reason": "abandoned" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
    }

    let (_, body) =
        send(&ctx, Method::GET, &format!("/api/v1/tryout/result/{session_id}"), Some(&token), None)
            .await;
    assert!(body["data"]["participant_test"]["end_date"].is_null());
}
