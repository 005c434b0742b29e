use serde::Deserialize;
use std::time::Duration;

use crate::services::delivery::RetryPolicy;
use crate::services::worker::WorkerSettings;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Shared secret callers put in the task URL
    pub api_key: String,

    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the worker binary.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Without it tasks live in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Run the worker loop inside the server process
    #[serde(default = "default_true")]
    pub run_worker: bool,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_compute_timeout_secs")]
    pub compute_timeout_secs: u64,

    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    #[serde(default = "default_callback_max_attempts")]
    pub callback_max_attempts: u32,

    #[serde(default = "default_callback_retry_base_ms")]
    pub callback_retry_base_ms: u64,

    /// POST an error payload to the callback when labeling fails
    #[serde(default = "default_true")]
    pub notify_on_error: bool,

    /// Claims older than this are released when a worker starts
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,

    /// Remote label computer endpoint; the static labeler is used without it
    #[serde(default)]
    pub labeler_url: Option<String>,

    #[serde(default)]
    pub labeler_token: Option<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_compute_timeout_secs() -> u64 {
    300
}

fn default_callback_timeout_secs() -> u64 {
    30
}

fn default_callback_max_attempts() -> u32 {
    3
}

fn default_callback_retry_base_ms() -> u64 {
    1000
}

fn default_claim_timeout_secs() -> u64 {
    3600
}

fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            compute_timeout: Duration::from_secs(self.compute_timeout_secs),
            delivery: RetryPolicy {
                max_attempts: self.callback_max_attempts,
                base_delay: Duration::from_millis(self.callback_retry_base_ms),
            },
            notify_on_error: self.notify_on_error,
            claim_timeout: Duration::from_secs(self.claim_timeout_secs),
        }
    }
}
