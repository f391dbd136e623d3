//! vrgate - One-time PIN access for VR headsets
//!
//! Headsets without a camera cannot scan a QR code, so a companion device
//! requests a short numeric PIN bound to a destination and the user types it
//! on the headset.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use vrgate_core::Config;
use vrgate_server::{create_router, AppState};
use vrgate_session::SessionManager;

/// vrgate - Issue and redeem one-time VR access PINs
#[derive(Parser, Debug)]
#[command(name = "vrgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Load settings from a JSON file; flags override it
    #[arg(short, long)]
    config: Option<String>,

    /// Server port
    #[arg(short, long, env = "GATEWAY_PORT")]
    port: Option<u16>,

    /// Number of digits per PIN
    #[arg(short = 'w', long)]
    code_width: Option<usize>,

    /// Seconds a PIN stays redeemable
    #[arg(short, long)]
    ttl: Option<i64>,

    /// Seconds between sweeps of expired PINs
    #[arg(long)]
    reap_interval: Option<u64>,

    /// Consecutive PIN collisions before an immediate sweep
    #[arg(long)]
    collision_threshold: Option<u32>,

    /// Attempts to find a free PIN before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Viewer URL encoded in QR deep links
    #[arg(long, env = "VR_VIEWER_URL")]
    viewer_url: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::new(),
        };

        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(width) = self.code_width {
            config = config.with_code_width(width);
        }
        if let Some(ttl) = self.ttl {
            config = config.with_session_ttl_secs(ttl);
        }
        if let Some(interval) = self.reap_interval {
            config = config.with_reap_interval_secs(interval);
        }
        if let Some(threshold) = self.collision_threshold {
            config = config.with_collision_threshold(threshold);
        }
        if let Some(attempts) = self.max_attempts {
            config = config.with_max_issue_attempts(attempts);
        }
        if let Some(url) = self.viewer_url {
            config = config.with_viewer_url(url);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("vrgate v{}", env!("CARGO_PKG_VERSION"));

    let config = args.into_config()?;
    info!(
        "PIN width {}, TTL {}s, sweep every {}s",
        config.code_width, config.session_ttl_secs, config.reap_interval_secs
    );

    let session_manager = Arc::new(SessionManager::new(&config));
    let reaper = session_manager.start_reaper();

    let state = Arc::new(AppState::new(config.clone(), session_manager.clone()));
    let router = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Gateway server running on port {}", config.port);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    reaper.stop().await;

    info!("Goodbye!");
    Ok(())
}
