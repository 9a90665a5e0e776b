//! Control surface integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use rigo_avatar::api::{self, ApiState};
use rigo_avatar::state::MAX_TALK_SPEED;
use rigo_avatar::{ExpressionKind, ManualClock, StateHandle};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::manual_state;

/// Build a test router over a manual-clock state actor
fn build_test_router() -> (Router, StateHandle, ManualClock) {
    let (state, clock) = manual_state();
    let app = api::router(Arc::new(ApiState {
        state: state.clone(),
    }));
    (app, state, clock)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = build_test_router();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_initial_state_is_happy_and_quiet() {
    let (app, _, _) = build_test_router();

    let (status, json) = get(&app, "/state").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "emotion": "happy", "talk": false }));
}

#[tokio::test]
async fn test_emotion_round_trips_through_state() {
    let (app, _, _) = build_test_router();

    for name in ["sad", "puzzled", "angry", "neutral", "happy"] {
        let (status, json) = post(&app, "/emotion", &json!({ "emotion": name }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true }));

        let (_, state) = get(&app, "/state").await;
        assert_eq!(state["emotion"], name);
    }
}

#[tokio::test]
async fn test_emotion_name_is_normalized() {
    let (app, state, _) = build_test_router();

    post(&app, "/emotion", r#"{"emotion": "  ANGRY "}"#).await;
    assert_eq!(state.read().expression, ExpressionKind::Angry);

    let (status, _) = post(&app, "/emotion", r#"{"emotion": "ecstatic"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.read().expression, ExpressionKind::Neutral);
}

#[tokio::test]
async fn test_emotion_without_name_is_rejected() {
    let (app, state, _) = build_test_router();

    let (status, json) = post(&app, "/emotion", r#"{"hold_ms": 500}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().contains("emotion"));

    // Nothing was applied
    assert_eq!(state.snapshot().talk_hold_until_us, 0);
    assert_eq!(state.read().expression, ExpressionKind::Happy);
}

#[tokio::test]
async fn test_malformed_body_is_rejected_everywhere() {
    let (app, state, _) = build_test_router();

    for uri in ["/emotion", "/talk", "/perform"] {
        for body in ["", "{not json", "[1, 2]", "\"sad\""] {
            let (status, json) = post(&app, uri, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body:?}");
            assert_eq!(json, json!({ "ok": false, "error": "invalid json body" }));
        }
    }

    assert_eq!(state.read().expression, ExpressionKind::Happy);
    assert!(!state.read().is_talking);
}

#[tokio::test]
async fn test_emotion_hold_extends_talking_without_flag() {
    let (app, state, clock) = build_test_router();

    post(&app, "/emotion", r#"{"emotion": "sad", "hold_ms": 300}"#).await;

    let (_, json) = get(&app, "/state").await;
    assert_eq!(json, json!({ "emotion": "sad", "talk": true }));
    assert!(!state.snapshot().desired_talking);

    clock.advance(Duration::from_millis(300));
    let (_, json) = get(&app, "/state").await;
    assert_eq!(json["talk"], false);
}

#[tokio::test]
async fn test_talk_flag_on_and_off() {
    let (app, _, clock) = build_test_router();

    post(&app, "/talk", r#"{"on": true}"#).await;
    clock.advance(Duration::from_secs(60));
    assert_eq!(get(&app, "/state").await.1["talk"], true);

    post(&app, "/talk", r#"{"on": false}"#).await;
    assert_eq!(get(&app, "/state").await.1["talk"], false);
}

#[tokio::test]
async fn test_talk_duration_expires() {
    let (app, _, clock) = build_test_router();

    post(&app, "/talk", r#"{"duration_ms": 1000}"#).await;
    clock.advance(Duration::from_millis(999));
    assert_eq!(get(&app, "/state").await.1["talk"], true);

    clock.advance(Duration::from_millis(1));
    assert_eq!(get(&app, "/state").await.1["talk"], false);
}

#[tokio::test]
async fn test_talk_ignores_junk_values() {
    let (app, state, _) = build_test_router();

    let (status, _) = post(
        &app,
        "/talk",
        r#"{"on": "yes", "duration_ms": -20, "speed": "fast"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let snapshot = state.snapshot();
    assert!(!snapshot.desired_talking);
    assert_eq!(snapshot.talk_hold_until_us, 0);
    assert_eq!(snapshot.talk_speed, rigo_avatar::state::DEFAULT_TALK_SPEED);
}

#[tokio::test]
async fn test_talk_speed_is_clamped() {
    let (app, state, _) = build_test_router();

    post(&app, "/talk", r#"{"speed": 99}"#).await;
    assert_eq!(state.snapshot().talk_speed, MAX_TALK_SPEED);

    post(&app, "/talk", r#"{"speed": 0}"#).await;
    assert_eq!(state.snapshot().talk_speed, 1);
}

#[tokio::test]
async fn test_perform_derives_hold_from_text() {
    let (app, _, clock) = build_test_router();

    let (status, json) = post(&app, "/perform", r#"{"emotion": "happy", "text": "hello"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);

    // Five characters clamp up to the 900 ms floor
    clock.advance(Duration::from_millis(899));
    assert_eq!(get(&app, "/state").await.1["talk"], true);
    clock.advance(Duration::from_millis(1));
    assert_eq!(get(&app, "/state").await.1["talk"], false);
}

#[tokio::test]
async fn test_perform_explicit_duration_beats_text() {
    let (app, _, clock) = build_test_router();

    let text = "a".repeat(300);
    let body = json!({ "emotion": "puzzled", "text": text, "duration_ms": 200 });
    post(&app, "/perform", &body.to_string()).await;

    clock.advance(Duration::from_millis(200));
    assert_eq!(
        get(&app, "/state").await.1,
        json!({ "emotion": "puzzled", "talk": false })
    );
}

#[tokio::test]
async fn test_perform_without_emotion_goes_neutral() {
    let (app, state, _) = build_test_router();

    let (status, _) = post(&app, "/perform", r#"{"talk": true}"#).await;

    assert_eq!(status, StatusCode::OK);
    let view = state.read();
    assert_eq!(view.expression, ExpressionKind::Neutral);
    assert!(view.is_talking);
}

#[tokio::test]
async fn test_writes_are_visible_to_the_next_read() {
    let (app, state, _) = build_test_router();

    tokio_test::assert_ok!(state.set_expression(ExpressionKind::Sad).await);
    assert_eq!(get(&app, "/state").await.1["emotion"], "sad");

    post(&app, "/emotion", r#"{"emotion": "angry"}"#).await;
    assert_eq!(state.read().expression, ExpressionKind::Angry);
}

#[tokio::test]
async fn test_perform_is_published_as_one_record() {
    let (app, state, _) = build_test_router();
    let mut rx = state.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let record = *rx.borrow_and_update();
            seen.push(record);
            if record.desired_talking {
                break;
            }
        }
        seen
    });

    let (status, _) = post(&app, "/perform", r#"{"emotion": "angry", "talk": true}"#).await;
    assert_eq!(status, StatusCode::OK);

    let seen = watcher.await.unwrap();
    assert_eq!(seen.len(), 1, "intermediate record published: {seen:?}");
    assert_eq!(seen[0].desired_expression, ExpressionKind::Angry);
}
