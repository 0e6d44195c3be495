use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use hearline_core::Config;
use hearline_server::cli::{Cli, Command};
use hearline_server::live::run_live;
use hearline_server::{AppState, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Serve { host, port } => {
            let config = Config::from_env_unchecked();
            if config.scribe_api_key.is_empty() {
                warn!("ELEVEN_API_KEY not set, serving in degraded mode");
            }
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;
            let state = Arc::new(AppState::new(config));
            Server::new(state, addr).start().await?;
        }
        Command::Live { device, record } => {
            // live mode cannot do anything useful without a backend
            let config = Config::from_env()?;
            run_live(config, device, record).await?;
        }
        Command::Devices => {
            for device in hearline_audio::list_audio_devices()? {
                println!("{device}");
            }
        }
    }

    Ok(())
}
