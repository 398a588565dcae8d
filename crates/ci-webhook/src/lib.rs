//! Git webhook receiver
//!
//! This crate provides the pieces of a shared-secret webhook endpoint:
//! - Constant-time token comparison
//! - Defaulting access to untyped JSON payloads
//! - Event classification (push, pull request, everything else)
//! - An Axum router that authenticates, parses and dispatches deliveries
//! - Optional deploy/test scripts triggered by dispatched events
//!
//! # Request lifecycle
//!
//! Every delivery walks the same path and never shares state with another:
//!
//! ```text
//! START -> AUTHENTICATING -> FORBIDDEN (403)
//!                         -> PARSING -> BAD_JSON (400)
//!                                    -> DISPATCHING -> RESPONDING (200)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ci_webhook::{create_webhook_router, ReceiverConfig, ReceiverState, WebhookSecret};
//! use std::sync::Arc;
//!
//! let config = ReceiverConfig::new(WebhookSecret::new("myciwebhook"));
//! let state = Arc::new(ReceiverState::new(config));
//! let app = create_webhook_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod compare;
pub mod payload;
pub mod events;
pub mod settings;
pub mod actions;
pub mod inbound;

pub use compare::*;
pub use payload::*;
pub use events::*;
pub use settings::*;
pub use actions::*;
pub use inbound::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Webhook errors
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Token header missing, empty or not matching the configured secret.
    /// Callers never learn which of those it was.
    #[error("Forbidden: Invalid Secret")]
    Forbidden,

    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Action failed: {0}")]
    Action(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;

impl WebhookError {
    /// HTTP status code reported to the caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message reported to the caller. Never includes error details.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Forbidden => "Forbidden: Invalid Secret",
            Self::InvalidPayload(_) => "Invalid JSON payload",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = WebhookResponse::new(self.public_message());
        (self.status_code(), Json(body)).into_response()
    }
}
