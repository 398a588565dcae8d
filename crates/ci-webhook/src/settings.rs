//! Receiver configuration
//!
//! Loaded once at startup and shared read-only with every request.
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `CI_WEBHOOK__*` environment variables, then explicit overrides
//! (normally the command line).

use crate::{Result, WebhookError};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `CI_WEBHOOK__SERVER__PORT`
pub const ENV_PREFIX: &str = "CI_WEBHOOK";

/// Shared secret expected in the token header
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("WebhookSecret(<empty>)")
        } else {
            f.write_str("WebhookSecret(<redacted>)")
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub webhook: ReceiverConfig,
}

/// Values that take precedence over every other source
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secret: Option<String>,
    pub path: Option<String>,
}

impl Settings {
    /// Load settings from defaults, an optional file, the environment and
    /// explicit overrides, then validate them.
    pub fn load_with(file: Option<&Path>, overrides: SettingsOverrides) -> Result<Self> {
        Self::load_from(file, None, overrides)
    }

    /// Like [`load_with`](Self::load_with), reading `CI_WEBHOOK__*` variables
    /// from `env` instead of the process environment when given.
    pub fn load_from(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
        overrides: SettingsOverrides,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("webhook.secret", "")?
            .set_default("webhook.path", default_path())?
            .set_default("webhook.actions.timeout_secs", default_timeout_secs() as i64)?
            .set_default("webhook.actions.max_concurrent", default_max_concurrent() as i64)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            // Values stay strings; numeric fields are converted on
            // deserialization so secrets like "007" survive unchanged.
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(env),
            )
            .set_override_option("server.host", overrides.host)?
            .set_override_option("server.port", overrides.port.map(i64::from))?
            .set_override_option("webhook.secret", overrides.secret)?
            .set_override_option("webhook.path", overrides.path)?
            .build()?;

        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.webhook.validate()
    }
}

/// HTTP bind configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Webhook endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    /// Secret callers must present in `X-Custom-Webhook-Token`
    #[serde(default)]
    pub secret: WebhookSecret,
    /// Route the endpoint is mounted on
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub actions: ActionConfig,
}

impl ReceiverConfig {
    pub fn new(secret: WebhookSecret) -> Self {
        Self {
            secret,
            path: default_path(),
            actions: ActionConfig::default(),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_actions(mut self, actions: ActionConfig) -> Self {
        self.actions = actions;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(WebhookError::InvalidConfig(format!(
                "webhook path must start with '/': {}",
                self.path
            )));
        }
        if self.actions.timeout_secs == 0 {
            return Err(WebhookError::InvalidConfig(
                "action timeout must be greater than zero".to_string(),
            ));
        }
        if self.actions.max_concurrent == 0 {
            return Err(WebhookError::InvalidConfig(
                "max_concurrent actions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scripts run after a delivery has been dispatched
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// Run on `push` with the branch name as its argument
    #[serde(default)]
    pub deploy_script: Option<PathBuf>,
    /// Run on `pull_request` with the PR number as its argument
    #[serde(default)]
    pub test_script: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Scripts allowed to run at the same time; the default of 1 keeps
    /// deploys for back-to-back pushes from overlapping
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl ActionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_empty(&self) -> bool {
        self.deploy_script.is_none() && self.test_script.is_none()
    }
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            deploy_script: None,
            test_script: None,
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_path() -> String {
    "/webhook".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    1
}
