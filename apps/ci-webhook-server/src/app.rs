//! Application state and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use ci_webhook::{ReceiverState, ServerConfig, Settings};

use crate::cli::Args;
use crate::server::Server;

/// Main application
pub struct App {
    server_config: ServerConfig,
    receiver: Arc<ReceiverState>,
}

impl App {
    /// Build the application from command-line arguments, the optional
    /// configuration file and the environment
    pub fn build(args: &Args) -> Result<Self> {
        let settings = Settings::load_with(args.config.as_deref(), args.overrides())
            .context("Failed to load configuration")?;

        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: Settings) -> Self {
        if settings.webhook.secret.is_empty() {
            warn!("No webhook secret configured; every delivery will be rejected with 403");
        }

        let receiver = Arc::new(ReceiverState::new(settings.webhook));

        Self {
            server_config: settings.server,
            receiver,
        }
    }

    /// Run the application until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        info!("Starting server");
        info!("Webhook path: {}", self.receiver.config().path);

        let server = Server::new(self.server_config, self.receiver);
        server.run().await?;

        Ok(())
    }
}
