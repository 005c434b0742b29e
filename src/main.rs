use label_hook::{
    app_state::AppState,
    config::AppConfig,
    routes::{self, metrics::prometheus_metrics},
    services::{self, delivery::CallbackClient, worker::Worker},
    store,
};

use axum::routing::get;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing label-hook server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    let store = store::open(config.database_url.as_deref())
        .await
        .expect("Failed to open task store");

    if config.database_url.is_none() && !config.run_worker {
        tracing::warn!("In-memory store without RUN_WORKER: queued tasks will never be processed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = if config.run_worker {
        let callbacks = CallbackClient::new(config.callback_timeout())
            .expect("Failed to build callback HTTP client");
        let worker = Worker::new(
            store.clone(),
            services::build_labeler(&config),
            callbacks,
            config.worker_settings(),
        );
        tracing::info!("Starting in-process worker");
        Some(tokio::spawn(async move { worker.run(shutdown_rx).await }))
    } else {
        None
    };

    let state = AppState::new(store, &config.api_key);

    let app = routes::api_router(state, config.max_body_bytes)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    shutdown_tx.send(true).ok();
    if let Some(handle) = worker_handle {
        handle.await.ok();
    }
}
