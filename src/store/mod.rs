//! Task storage.
//!
//! [`TaskStore`] is the single shared mutable resource of the pipeline: the
//! HTTP handlers insert and read, the worker claims and finishes. Two
//! backends exist, [`memory::MemoryTaskStore`] for tests and single-process
//! deployments and [`postgres::PgTaskStore`] for durable multi-worker setups.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::task::{Task, TaskResult, TaskStatus};

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Store a new pending task. Returns `false` when the id already exists,
    /// leaving the original untouched.
    async fn insert(&self, task: Task) -> Result<bool, StoreError>;

    /// All tasks currently `pending`, oldest first. Claimed tasks are excluded.
    async fn find_pending(&self) -> Result<Vec<Task>, StoreError>;

    /// `"<user_id>/<camera>"` for every pending task, oldest first.
    /// Backends should override this to avoid loading image payloads.
    async fn pending_keys(&self) -> Result<Vec<String>, StoreError> {
        let pending = self.find_pending().await?;
        Ok(pending.iter().map(|t| t.request.display_key()).collect())
    }

    /// Atomically move the oldest pending task to `in_flight` and return it.
    async fn claim_next_pending(&self) -> Result<Option<Task>, StoreError>;

    async fn complete(&self, id: &str, result: &TaskResult) -> Result<(), StoreError>;

    async fn fail(&self, id: &str, detail: &str) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Put claims older than `older_than` back into the pending pool.
    /// Used on worker start-up to recover from a crashed worker.
    async fn release_stale_claims(&self, older_than: Duration) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Check a terminal transition against the current status.
pub(crate) fn check_finish(id: &str, from: TaskStatus, to: TaskStatus) -> Result<(), StoreError> {
    if from.is_terminal() {
        return Err(StoreError::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        });
    }
    Ok(())
}

/// Open the store the configuration asks for: PostgreSQL (with migrations
/// applied) when `database_url` is set, memory otherwise.
pub async fn open(database_url: Option<&str>) -> Result<Arc<dyn TaskStore>, StoreError> {
    match database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL task store");
            let pool = crate::db::init_pool(url).await?;
            tracing::info!("Running database migrations");
            crate::db::run_migrations(&pool).await?;
            Ok(Arc::new(postgres::PgTaskStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, tasks are kept in memory only");
            Ok(Arc::new(memory::MemoryTaskStore::new()))
        }
    }
}
