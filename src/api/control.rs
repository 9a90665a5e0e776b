//! Expression control endpoints
//!
//! Bodies are parsed by hand from raw bytes so that every malformed request,
//! whatever its content type, gets the same `{"ok": false, "error": ...}`
//! shape instead of axum's default rejection.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Map, Value};

use super::ApiState;
use crate::face::ExpressionKind;
use crate::state::StateUpdate;

/// Milliseconds of talking per character of performed text
const MS_PER_CHAR: u64 = 70;

/// Shortest text-derived hold
const MIN_TEXT_HOLD: Duration = Duration::from_millis(900);

/// Longest text-derived hold
const MAX_TEXT_HOLD: Duration = Duration::from_millis(12_000);

/// `GET /state` response
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub emotion: ExpressionKind,
    pub talk: bool,
}

/// Success body for writes
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

const OK: Json<OkResponse> = Json(OkResponse { ok: true });

/// Control API errors
#[derive(Debug)]
pub enum ControlError {
    InvalidBody,
    MissingField(&'static str),
    Unavailable(String),
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            ok: bool,
            error: String,
        }

        let (status, error) = match self {
            Self::InvalidBody => (StatusCode::BAD_REQUEST, "invalid json body".to_string()),
            Self::MissingField(field) => (StatusCode::BAD_REQUEST, format!("missing {field}")),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(ErrorResponse { ok: false, error })).into_response()
    }
}

impl From<crate::Error> for ControlError {
    fn from(e: crate::Error) -> Self {
        tracing::error!(error = %e, "state update failed");
        Self::Unavailable(e.to_string())
    }
}

/// Talk hold derived from the length of spoken text
///
/// `chars × 70 ms`, clamped to `[900 ms, 12 s]`.
#[must_use]
pub fn text_hold(text: &str) -> Duration {
    let chars = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
    Duration::from_millis(chars.saturating_mul(MS_PER_CHAR)).clamp(MIN_TEXT_HOLD, MAX_TEXT_HOLD)
}

fn parse_object(body: &Bytes) -> Result<Map<String, Value>, ControlError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ControlError::InvalidBody),
    }
}

/// A positive number of milliseconds; anything else is ignored
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_ms(value: Option<&Value>) -> Option<Duration> {
    let ms = value?.as_f64().filter(|ms| ms.is_finite() && *ms >= 1.0)?;
    Some(Duration::from_millis(ms as u64))
}

#[allow(clippy::cast_possible_truncation)]
fn number(value: Option<&Value>) -> Option<i64> {
    let n = value?;
    n.as_i64()
        .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

async fn get_state(State(state): State<Arc<ApiState>>) -> Json<StateResponse> {
    let view = state.state.read();
    Json(StateResponse {
        emotion: view.expression,
        talk: view.is_talking,
    })
}

async fn set_emotion(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<OkResponse>, ControlError> {
    let req = parse_object(&body)?;
    let emotion = req
        .get("emotion")
        .and_then(Value::as_str)
        .ok_or(ControlError::MissingField("emotion"))?;
    let kind = ExpressionKind::from_name(emotion);

    state
        .state
        .apply(StateUpdate::Perform {
            expression: Some(kind),
            on: None,
            hold: positive_ms(req.get("hold_ms")),
            speed: None,
        })
        .await?;

    tracing::debug!(emotion = %kind, "expression set");
    Ok(OK)
}

async fn set_talk(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<OkResponse>, ControlError> {
    let req = parse_object(&body)?;
    let on = req.get("on").and_then(Value::as_bool);
    let hold = positive_ms(req.get("duration_ms"));
    let speed = number(req.get("speed"));

    if on.is_some() || hold.is_some() || speed.is_some() {
        state
            .state
            .apply(StateUpdate::Perform {
                expression: None,
                on,
                hold,
                speed,
            })
            .await?;
    }

    tracing::debug!(?on, ?hold, "talk set");
    Ok(OK)
}

async fn perform(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<OkResponse>, ControlError> {
    let req = parse_object(&body)?;
    let kind = ExpressionKind::from_name(req.get("emotion").and_then(Value::as_str).unwrap_or(""));
    let on = req.get("talk").and_then(Value::as_bool);
    let text = req.get("text").and_then(Value::as_str).filter(|t| !t.is_empty());
    let hold = positive_ms(req.get("duration_ms")).or_else(|| text.map(text_hold));

    state
        .state
        .apply(StateUpdate::Perform {
            expression: Some(kind),
            on,
            hold,
            speed: None,
        })
        .await?;

    tracing::debug!(emotion = %kind, ?on, ?hold, "performed");
    Ok(OK)
}

/// Build the control router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/emotion", post(set_emotion))
        .route("/talk", post(set_talk))
        .route("/perform", post(perform))
        .with_state(state)
}
