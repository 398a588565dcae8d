//! Command-line argument parsing

use ci_webhook::SettingsOverrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(
    name = "ci-webhook-server",
    about = "Git webhook receiver",
    version,
    long_about = "Receives webhook deliveries from a Git hosting platform, checks the \
                  shared-secret token and dispatches push and pull request events."
)]
pub struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "BIND_HOST")]
    pub host: Option<String>,

    /// HTTP server port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Shared secret expected in the X-Custom-Webhook-Token header
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Route the webhook endpoint is mounted on
    #[arg(long, env = "WEBHOOK_PATH")]
    pub path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format (useful for production)
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Args {
    /// Command-line values that override file and environment settings
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            host: self.host.clone(),
            port: self.port,
            secret: self.secret.clone(),
            path: self.path.clone(),
        }
    }
}

// Keeps the secret out of `{:?}` output.
impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("config", &self.config)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("path", &self.path)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}
