//! Integration tests for the webhook receiver route.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use ci_webhook::{
    create_webhook_router, secure_compare, ReceiverConfig, ReceiverState, WebhookResponse,
    WebhookSecret,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

const SECRET: &str = "myciwebhook";

fn app() -> Router {
    let config = ReceiverConfig::new(WebhookSecret::new(SECRET));
    create_webhook_router(Arc::new(ReceiverState::new(config)))
}

fn delivery(token: Option<&str>, event: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/webhook")
        .header("content-type", "application/json");

    if let Some(token) = token {
        builder = builder.header("X-Custom-Webhook-Token", token);
    }
    if let Some(event) = event {
        builder = builder.header("X-GitHub-Event", event);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, WebhookResponse) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: WebhookResponse = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

fn assert_forbidden((status, body): (StatusCode, WebhookResponse)) {
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.message, "Forbidden: Invalid Secret");
}

fn assert_processed((status, body): (StatusCode, WebhookResponse)) {
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.message, "Webhook received and processed.");
}

// ==================== Authentication ====================

#[tokio::test]
async fn test_missing_token_is_forbidden() {
    assert_forbidden(send(app(), delivery(None, Some("push"), "{}")).await);
}

#[tokio::test]
async fn test_wrong_token_is_forbidden() {
    assert_forbidden(send(app(), delivery(Some("myciwebhooK"), Some("push"), "{}")).await);
    assert_forbidden(send(app(), delivery(Some("Myciwebhook"), Some("push"), "{}")).await);
    assert_forbidden(send(app(), delivery(Some(""), Some("push"), "{}")).await);
}

#[tokio::test]
async fn test_auth_checked_before_body_is_parsed() {
    assert_forbidden(send(app(), delivery(None, Some("push"), "{not json")).await);
    assert_forbidden(send(app(), delivery(Some("wrong"), None, "not json")).await);
}

#[tokio::test]
async fn test_empty_configured_secret_rejects_everything() {
    let config = ReceiverConfig::new(WebhookSecret::default());
    let app = create_webhook_router(Arc::new(ReceiverState::new(config)));

    assert_forbidden(send(app.clone(), delivery(Some(""), Some("push"), "{}")).await);
    assert_forbidden(send(app, delivery(Some(SECRET), Some("push"), "{}")).await);
}

// ==================== Payload parsing ====================

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let (status, body) = send(app(), delivery(Some(SECRET), Some("push"), "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.message, "Invalid JSON payload");
}

#[tokio::test]
async fn test_empty_body_is_bad_request() {
    let (status, body) = send(app(), delivery(Some(SECRET), Some("push"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.message, "Invalid JSON payload");
}

#[tokio::test]
async fn test_non_json_content_type_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("X-Custom-Webhook-Token", SECRET)
        .header("X-GitHub-Event", "push")
        .body(Body::from("payload=%7B%7D"))
        .unwrap();

    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.message, "Invalid JSON payload");
}

// ==================== Dispatch ====================

#[tokio::test]
async fn test_push_event() {
    let body = r#"{"ref": "refs/heads/main", "pusher": {"name": "alice"}}"#;
    assert_processed(send(app(), delivery(Some(SECRET), Some("push"), body)).await);
}

#[tokio::test]
async fn test_push_event_without_fields() {
    assert_processed(send(app(), delivery(Some(SECRET), Some("push"), "{}")).await);
}

#[tokio::test]
async fn test_pull_request_event() {
    let body = r#"{"action": "opened", "number": 42}"#;
    assert_processed(send(app(), delivery(Some(SECRET), Some("pull_request"), body)).await);
}

#[tokio::test]
async fn test_unknown_event_without_header() {
    assert_processed(send(app(), delivery(Some(SECRET), None, "{}")).await);
}

#[tokio::test]
async fn test_unhandled_event_type() {
    let body = r#"{"action": "created"}"#;
    assert_processed(send(app(), delivery(Some(SECRET), Some("issue_comment"), body)).await);
}

#[tokio::test]
async fn test_non_object_payloads_are_processed() {
    for body in ["[]", "null", "\"text\"", "42"] {
        assert_processed(send(app(), delivery(Some(SECRET), Some("push"), body)).await);
        assert_processed(send(app(), delivery(Some(SECRET), Some("pull_request"), body)).await);
    }
}

#[tokio::test]
async fn test_oddly_typed_fields_are_processed() {
    let body = r#"{"ref": 7, "pusher": "alice", "action": null, "number": {"n": 1}}"#;
    assert_processed(send(app(), delivery(Some(SECRET), Some("push"), body)).await);
    assert_processed(send(app(), delivery(Some(SECRET), Some("pull_request"), body)).await);
}

#[tokio::test]
async fn test_header_names_are_case_insensitive() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhook")
        .header("Content-Type", "application/json; charset=utf-8")
        .header("x-custom-webhook-token", SECRET)
        .header("X-GITHUB-EVENT", "push")
        .body(Body::from("{}"))
        .unwrap();

    assert_processed(send(app(), request).await);
}

// ==================== Routing ====================

#[tokio::test]
async fn test_custom_path() {
    let config = ReceiverConfig::new(WebhookSecret::new(SECRET)).with_path("/hooks/git");
    let app = create_webhook_router(Arc::new(ReceiverState::new(config)));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/hooks/git")
        .header("content-type", "application/json")
        .header("X-Custom-Webhook-Token", SECRET)
        .body(Body::from("{}"))
        .unwrap();
    assert_processed(send(app.clone(), request).await);

    let response = app.oneshot(delivery(Some(SECRET), None, "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_post_is_routed() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/webhook")
        .header("X-Custom-Webhook-Token", SECRET)
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ==================== Timing ====================

const SECRET_LEN: usize = 64 * 1024;
const ROUNDS: usize = 31;

/// Median wall time of `iterations` calls to `compare`, over `ROUNDS` rounds.
fn median_time(iterations: usize, compare: impl Fn() -> bool) -> f64 {
    let mut samples: Vec<Duration> = (0..ROUNDS)
        .map(|_| {
            let start = Instant::now();
            for _ in 0..iterations {
                std::hint::black_box(compare());
            }
            start.elapsed()
        })
        .collect();

    samples.sort();
    samples[ROUNDS / 2].as_nanos().max(1) as f64
}

/// Time of a first-byte mismatch relative to a full match of the same length.
///
/// A comparison that stops at the first differing byte does almost no work
/// for the mismatch and reads all of both inputs for the match.
fn mismatch_to_match_ratio(iterations: usize, compare: fn(&str, &str) -> bool) -> f64 {
    let expected = "a".repeat(SECRET_LEN);
    let matching = expected.clone();
    let first_differs = format!("b{}", "a".repeat(SECRET_LEN - 1));

    let run = |received: &str| {
        median_time(iterations, || {
            compare(std::hint::black_box(received), std::hint::black_box(expected.as_str()))
        })
    };

    // Warm up caches before measuring.
    run(first_differs.as_str());
    run(matching.as_str());

    run(first_differs.as_str()) / run(matching.as_str())
}

fn secure(received: &str, expected: &str) -> bool {
    secure_compare(Some(received), expected)
}

fn short_circuiting(received: &str, expected: &str) -> bool {
    received.as_bytes() == expected.as_bytes()
}

#[test]
fn test_comparison_time_does_not_track_mismatch_position() {
    let baseline = mismatch_to_match_ratio(200, short_circuiting);
    let constant_time = mismatch_to_match_ratio(4, secure);

    // The measurement has to be able to see an early exit at all.
    assert!(
        baseline < 0.25,
        "short-circuiting comparison showed no skew: ratio={baseline}"
    );

    // A first-byte mismatch must cost about as much as reading the whole
    // secret; the bounds leave room for scheduler noise.
    assert!(
        (0.5..2.0).contains(&constant_time),
        "comparison time depends on mismatch position: ratio={constant_time} baseline={baseline}"
    );
    assert!(
        constant_time > baseline * 2.0,
        "secure comparison skews like a short-circuiting one: ratio={constant_time} baseline={baseline}"
    );
}
