//! ci-webhook-server entry point.
//!
//! Startup order matters: `.env` is read before argument parsing so that
//! `WEBHOOK_SECRET`, `PORT` and friends can come from it, and telemetry is
//! installed before settings are loaded so configuration problems are logged
//! through the same subscriber as everything else.

mod app;
mod cli;
mod server;
mod telemetry;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use crate::app::App;
use crate::cli::Args;
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is the normal case outside development.
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let args = Args::parse();

    if let Err(e) = init_telemetry(&args) {
        // No subscriber to report through.
        eprintln!("ci-webhook-server: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dotenv = dotenv_loaded,
        config_file = ?args.config,
        "Webhook server starting up"
    );

    match serve(&args).await {
        Ok(()) => {
            info!("Webhook server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Webhook server failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load settings and serve until a shutdown signal arrives
async fn serve(args: &Args) -> anyhow::Result<()> {
    App::build(args)?.run().await
}
