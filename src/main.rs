use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::timeout::TimeoutLayer;

use portalseguranca_api::broadcast::LogBroadcaster;
use portalseguranca_api::config::{config_path, ForceConfig};
use portalseguranca_api::database::TenantConnectionRegistry;
use portalseguranca_api::routes::table;
use portalseguranca_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portalseguranca_api=info,tower_http=info".into()),
        )
        .init();

    let config = ForceConfig::load(&config_path()).context("loading force configuration")?;
    tracing::info!(forces = config.len(), "force configuration loaded");

    // A force database we cannot reach at startup makes the whole
    // process unreliable, so the probe failure is fatal.
    let registry = TenantConnectionRegistry::connect(&config)
        .await
        .context("connecting force database pools")?;

    let routes = table::routes().context("building route table")?;
    let state = AppState::new(config, registry, routes, Arc::new(LogBroadcaster));

    let app = portalseguranca_api::app(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let port = std::env::var("PORTALSEGURANCA_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    state.registry.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining");
}
