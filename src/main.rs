mod config;
mod error;
mod handlers;
mod metrics;
mod models;
mod principal;
mod rate_limit;
mod session;
mod state;
mod sweeper;
mod upstream;
mod validation;

use anyhow::{Context, Result};
use clap::Parser; // for cli
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::upstream::ChatClient;

#[tokio::main]
async fn main() -> Result<()> {
    // parse cli arguments
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let config = args.validate().context("invalid configuration")?;

    let upstream = ChatClient::new(&config.api_url, &config.client_version, config.api_timeout)
        .context("failed to build upstream client")?;

    // creating shared state
    let state = Arc::new(AppState {
        limiter: RateLimiter::new(config.policy),
        sessions: SessionStore::new(),
        upstream,
        identity_header: config.identity_header.clone(),
        session_idle: config.session_idle,
    });

    // spawn the background sweeper
    let sweep_state = Arc::clone(&state);
    let sweep_every = config.sweep_interval;
    tokio::spawn(async move {
        sweeper::sweeper(sweep_state, sweep_every).await;
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Gateway running on http://localhost:{}", config.port);
    info!("Forwarding chat to {}", config.api_url);
    info!(
        "Rate limit: anonymous {} / authenticated {} requests per {:?}",
        config.policy.anonymous.max_requests,
        config.policy.authenticated.max_requests,
        config.policy.longest_window()
    );
    info!("Identity header: {}", config.identity_header);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
