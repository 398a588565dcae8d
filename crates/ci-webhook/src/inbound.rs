//! Inbound webhook handling
//!
//! One POST route, handled in a single pass per delivery: authenticate the
//! token header, read the event type, parse the JSON body, classify and log
//! the event, kick off any configured actions, answer.

use crate::{
    actions::ActionRunner,
    compare::secure_compare,
    events::{WebhookEvent, EVENT_HEADER, UNKNOWN_EVENT},
    payload::EventPayload,
    settings::ReceiverConfig,
    Result, WebhookError,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the caller's shared-secret token
pub const TOKEN_HEADER: &str = "x-custom-webhook-token";

/// Largest accepted request body (GitHub caps deliveries at 25 MB)
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Message returned for every successfully dispatched delivery
pub const PROCESSED_MESSAGE: &str = "Webhook received and processed.";

/// JSON body of every response from the webhook route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub message: String,
}

impl WebhookResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn processed() -> Self {
        Self::new(PROCESSED_MESSAGE)
    }
}

/// Shared, read-only state for the webhook route
#[derive(Debug)]
pub struct ReceiverState {
    config: ReceiverConfig,
    actions: ActionRunner,
}

impl ReceiverState {
    /// Build state with the actions described by `config`
    pub fn new(config: ReceiverConfig) -> Self {
        let actions = ActionRunner::from_config(&config.actions);
        Self { config, actions }
    }

    /// Replace the configured actions
    pub fn with_actions(mut self, actions: ActionRunner) -> Self {
        self.actions = actions;
        self
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

/// Create Axum router for the webhook endpoint
pub fn create_webhook_router(state: Arc<ReceiverState>) -> Router {
    let path = state.config.path.clone();
    Router::new()
        .route(&path, post(handle_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Handle incoming webhook request
async fn handle_webhook(
    State(state): State<Arc<ReceiverState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    debug!(path = %state.config.path, "Received webhook delivery");

    authenticate(&headers, &state.config)?;

    let event_type = event_type(&headers);
    debug!(event_type = %event_type, "Event type");

    let payload = parse_payload(&headers, &body)?;

    let event = WebhookEvent::classify(&event_type, &payload);
    event.log();

    // Detached; the response does not depend on action outcomes.
    drop(state.actions.dispatch(&event));

    Ok(Json(WebhookResponse::processed()))
}

/// Check the token header against the configured secret
pub(crate) fn authenticate(headers: &HeaderMap, config: &ReceiverConfig) -> Result<()> {
    let token = header_str(headers, TOKEN_HEADER);

    if !secure_compare(token, config.secret.expose()) {
        warn!("SECURITY ALERT: Invalid or missing webhook token");
        return Err(WebhookError::Forbidden);
    }

    Ok(())
}

/// Event type from the event header, `"unknown"` when absent
pub(crate) fn event_type(headers: &HeaderMap) -> String {
    header_str(headers, EVENT_HEADER)
        .unwrap_or(UNKNOWN_EVENT)
        .to_string()
}

/// Parse the body as JSON, requiring a JSON content type
pub(crate) fn parse_payload(headers: &HeaderMap, body: &[u8]) -> Result<EventPayload> {
    if !is_json_content_type(headers) {
        let content_type = header_str(headers, CONTENT_TYPE.as_str()).unwrap_or("<none>");
        warn!(content_type = %content_type, "Could not parse JSON payload: unsupported content type");
        return Err(WebhookError::InvalidPayload(format!(
            "unsupported content type: {}",
            content_type
        )));
    }

    EventPayload::from_slice(body).map_err(|e| {
        warn!(error = %e, "Could not parse JSON payload");
        WebhookError::InvalidPayload(e.to_string())
    })
}

/// `application/json` or `application/*+json`, parameters ignored
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = header_str(headers, CONTENT_TYPE.as_str()) else {
        return false;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Header value as text; values that are not visible ASCII count as absent
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
