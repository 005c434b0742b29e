use label_hook::{
    config::AppConfig,
    services::{self, delivery::CallbackClient, worker::Worker},
    store,
};
use tokio::sync::watch;
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

    tracing::info!("Starting labeling worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // A standalone worker only sees tasks through a shared database.
    let database_url = config
        .database_url
        .as_deref()
        .expect("DATABASE_URL is required for the standalone worker");

    let store = store::open(Some(database_url))
        .await
        .expect("Failed to open task store");

    let callbacks =
        CallbackClient::new(config.callback_timeout()).expect("Failed to build callback HTTP client");

    let worker = Worker::new(
        store,
        services::build_labeler(&config),
        callbacks,
        config.worker_settings(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received, finishing current task");
        shutdown_tx.send(true).ok();
    });

    worker.run(shutdown_rx).await;
}
