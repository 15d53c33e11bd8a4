use std::net::SocketAddr;

use anyhow::Context;
use mpesa_relay::config::AppConfig;
use mpesa_relay::startup::{build_router, init_tracing, shutdown_signal, spawn_rate_limit_sweeper};
use mpesa_relay::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config);

    log_mpesa_config(&config);

    let addr = config.socket_addr()?;
    let environment = config.environment;

    let app_state = AppState::new(config).context("Failed to create M-Pesa HTTP client")?;
    let sweeper = spawn_rate_limit_sweeper(&app_state);
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", addr, e)
    })?;

    tracing::info!(
        "Server is running on port {} in {} mode",
        addr.port(),
        environment.as_str()
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    Ok(())
}

fn log_mpesa_config(config: &AppConfig) {
    let mpesa = &config.mpesa;
    tracing::info!("M-Pesa base URL: {}", mpesa.base_url);

    // Missing credentials only fail the requests that need them.
    if mpesa.consumer_key.is_none() || mpesa.consumer_secret.is_none() {
        tracing::warn!("MPESA_CONSUMER_KEY or MPESA_CONSUMER_SECRET is not set");
    }
    if mpesa.passkey.is_none() || mpesa.short_code.is_none() {
        tracing::warn!("MPESA_PASSKEY or MPESA_SHORTCODE is not set");
    }
    if mpesa.callback_url.is_none() {
        tracing::warn!("MPESA_CALLBACK_URL is not set; STK pushes will carry no callback URL");
    }
}
