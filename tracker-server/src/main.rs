use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tracker_server::config::TrackerConfig;
use tracker_server::cp::CpClient;
use tracker_server::service::TrainService;
use tracker_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tracker_server=info,tower_http=info")),
        )
        .init();

    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let client = CpClient::new(&config.api).expect("Failed to create CP client");
    let service = Arc::new(TrainService::new(Arc::new(client), &config));
    service.start();

    let app = create_router(AppState::new(Arc::clone(&service)));

    let addr = config.server.bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "Train tracker listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    service.stop().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
