mod config;
mod error;
mod http;
mod logger;
mod model;
mod notify;
mod service;
mod state;
mod store;

pub use error::{Error, StatusCodeError, ValidationError};

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;

use crate::config::Config;
use crate::state::State;

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// Path to the configuration file.
    #[clap(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Build the configuration from environment variables only.
    #[clap(long)]
    env: bool,
    /// Create all tables and exit.
    #[clap(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.env {
        Config::from_environment()?
    } else {
        Config::from_file(&args.config).await?.with_environment()
    };

    logger::init(config.loglevel)?;

    log::info!(
        "Starting tournament-fixture-server v{}",
        env!("CARGO_PKG_VERSION")
    );
    log::debug!("Using config: {:?}", config);

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let bind = config.bind;
    let state = State::new(config, shutdown_rx)?;

    if args.migrate {
        state.store.migrate().await?;
        log::info!("Database migration finished");
        return Ok(());
    }

    tokio::task::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", err);
        }

        log::info!("Shutting down");
        let _ = shutdown_tx.send(());
    });

    http::bind(bind, state).await?;

    Ok(())
}
