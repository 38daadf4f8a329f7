use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use roadside_dispatch::api;
use roadside_dispatch::config::{Config, LogFormat};
use roadside_dispatch::engine::presence::run_presence_sweeper;
use roadside_dispatch::error::AppError;
use roadside_dispatch::payment::gateway::RazorpayGateway;
use roadside_dispatch::state::AppState;
use roadside_dispatch::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let credentials = config.razorpay_credentials();
    if credentials.is_none() {
        tracing::warn!("razorpay keys not configured; payment endpoints will fail");
    }

    let gateway = RazorpayGateway::new(
        credentials,
        config.razorpay_api_base.clone(),
        config.gateway_timeout,
    )?;

    let app_state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(gateway),
        config.razorpay_key_secret.clone(),
        config.event_buffer_size,
    )
    .with_nearby_candidate_limit(config.nearby_candidate_limit);
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_presence_sweeper(
        shared_state.clone(),
        config.presence_timeout,
        config.presence_sweep_interval,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
