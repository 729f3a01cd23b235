use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gigreach_core::config::ScrapeConfig;
use gigreach_core::status::StatusHandle;
use gigreach_server::routes;
use gigreach_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gigreach=info".parse()?))
        .with_target(false)
        .init();

    let admin_token = std::env::var("GIGREACH_ADMIN_TOKEN").ok();
    if admin_token.is_none() {
        tracing::warn!("GIGREACH_ADMIN_TOKEN not set, admin endpoints are disabled");
    }
    let port = std::env::var("GIGREACH_PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config_path = PathBuf::from(
        std::env::var("GIGREACH_CONFIG_FILE").unwrap_or_else(|_| "gigreach.json".to_string()),
    );
    let config = ScrapeConfig::load(&config_path)?;

    let state = Arc::new(AppState {
        status: StatusHandle::new(),
        config: RwLock::new(config),
        config_path,
        cancel: Mutex::new(None),
        admin_token,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
