//! Webhook event classification
//!
//! Deliveries fall into exactly three buckets: `push`, `pull_request`, and
//! everything else. Classification reads fields through [`EventPayload`], so
//! it cannot fail on a sparse or oddly shaped payload.

use crate::payload::{branch_from_ref, EventPayload};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Header carrying the event type
pub const EVENT_HEADER: &str = "x-github-event";

/// Event type used when the event header is absent
pub const UNKNOWN_EVENT: &str = "unknown";

/// Push to a ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Branch derived from the pushed ref, or the raw ref for non-branch refs
    pub branch: String,
    pub pusher: String,
}

/// Pull request activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: String,
}

/// Classified webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebhookEvent {
    Push(PushEvent),
    PullRequest(PullRequestEvent),
    Unhandled { event_type: String },
}

impl WebhookEvent {
    /// Classify a delivery from its event type and payload
    pub fn classify(event_type: &str, payload: &EventPayload) -> Self {
        match event_type {
            "push" => {
                let git_ref = payload.field(&["ref"]);
                Self::Push(PushEvent {
                    branch: branch_from_ref(&git_ref).to_string(),
                    pusher: payload.field(&["pusher", "name"]),
                })
            }
            "pull_request" => Self::PullRequest(PullRequestEvent {
                action: payload.field(&["action"]),
                number: payload.field(&["number"]),
            }),
            other => Self::Unhandled {
                event_type: other.to_string(),
            },
        }
    }

    /// Event type label as received
    pub fn event_type(&self) -> &str {
        match self {
            Self::Push(_) => "push",
            Self::PullRequest(_) => "pull_request",
            Self::Unhandled { event_type } => event_type,
        }
    }

    /// Emit the single informational log entry for this delivery
    pub fn log(&self) {
        match self {
            Self::Push(push) => {
                info!(
                    branch = %push.branch,
                    pusher = %push.pusher,
                    "Push event detected on branch {} by {}",
                    push.branch,
                    push.pusher
                );
            }
            Self::PullRequest(pr) => {
                info!(
                    number = %pr.number,
                    action = %pr.action,
                    "Pull request #{} event: {}",
                    pr.number,
                    pr.action
                );
            }
            Self::Unhandled { event_type } => {
                info!(event_type = %event_type, "Unhandled event type: {}", event_type);
            }
        }
    }
}
