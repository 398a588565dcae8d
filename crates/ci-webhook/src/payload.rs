//! Defaulting access to webhook payloads
//!
//! Git platforms send differently shaped JSON per event type. Nothing here
//! assumes a schema: every read returns a default when a key, or any object
//! along a nested path, is absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default rendered for absent payload fields
pub const FIELD_DEFAULT: &str = "N/A";

/// Prefix of fully-qualified branch refs
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Untyped webhook payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPayload(Value);

impl EventPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a raw request body
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body).map(Self)
    }

    /// Look up a value along a path of object keys.
    ///
    /// Returns `None` if any segment is missing or the value at that point is
    /// not an object.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |value, key| value.get(*key))
    }

    /// Render the value at `path` as text, falling back to `default`.
    ///
    /// Strings are returned without quotes; other JSON values use their JSON
    /// text (`42`, `true`, ...). An explicit `null` counts as present.
    pub fn field_or(&self, path: &[&str], default: &str) -> String {
        match self.lookup(path) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }

    /// Same as [`field_or`](Self::field_or) with the `"N/A"` default
    pub fn field(&self, path: &[&str]) -> String {
        self.field_or(path, FIELD_DEFAULT)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for EventPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Derive a branch name from a git ref.
///
/// `refs/heads/...` refs yield the last `/`-separated segment
/// (`refs/heads/feature/foo` -> `foo`); anything else is returned unchanged.
pub fn branch_from_ref(git_ref: &str) -> &str {
    if git_ref.starts_with(BRANCH_REF_PREFIX) {
        git_ref.rsplit('/').next().unwrap_or(git_ref)
    } else {
        git_ref
    }
}
