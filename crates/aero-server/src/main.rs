//! Aero Server - project submission backend with background conflict analysis

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aero_server::config::Config;
use aero_server::loops::analysis_loop;
use aero_server::state::AppState;
use aero_server::{api, persistence};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(config.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.log_json).then(tracing_subscriber::fmt::layer))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("aero_server=debug".parse()?))
        .init();

    tracing::info!("Starting Aero Server...");

    let db = persistence::init_database(&config.database_path, config.database_max_connections).await?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Start background loops
    let queue = analysis_loop::spawn_analysis(db.clone(), &config, shutdown_rx);

    let port = config.server_port;
    let state = Arc::new(AppState::new(db, config, queue));

    // Build the app
    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(());

    Ok(())
}
