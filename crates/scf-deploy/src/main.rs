//! scf-deploy - command line entry point

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scf_deploy::cli::{self, Cli};
use scf_deploy::AppConfig;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env();
    tracing::debug!("Configuration loaded: {:?}", config);

    cli::run(cli, config).await
}
