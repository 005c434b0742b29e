//! PostgreSQL task store.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{check_finish, StoreError, TaskStore};
use crate::db::queries;
use crate::models::task::{Task, TaskResult, TaskStatus};

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a conditional update touched no row.
    async fn finish_rejected(&self, id: &str, to: TaskStatus) -> StoreError {
        match queries::get_task_status(&self.pool, id).await {
            Ok(Some(from)) => match check_finish(id, from, to) {
                Err(e) => e,
                // Raced with a release; report the state we saw.
                Ok(()) => StoreError::Backend(format!("task {id} changed concurrently")),
            },
            Ok(None) => StoreError::NotFound(id.to_string()),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: Task) -> Result<bool, StoreError> {
        Ok(queries::insert_task(&self.pool, &task).await?)
    }

    async fn find_pending(&self) -> Result<Vec<Task>, StoreError> {
        Ok(queries::get_pending_tasks(&self.pool).await?)
    }

    async fn pending_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(queries::get_pending_keys(&self.pool).await?)
    }

    async fn claim_next_pending(&self) -> Result<Option<Task>, StoreError> {
        Ok(queries::claim_next_pending(&self.pool).await?)
    }

    async fn complete(&self, id: &str, result: &TaskResult) -> Result<(), StoreError> {
        if queries::complete_task(&self.pool, id, result).await? {
            return Ok(());
        }
        Err(self.finish_rejected(id, TaskStatus::Completed).await)
    }

    async fn fail(&self, id: &str, detail: &str) -> Result<(), StoreError> {
        if queries::fail_task(&self.pool, id, detail).await? {
            return Ok(());
        }
        Err(self.finish_rejected(id, TaskStatus::Error).await)
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(queries::get_task(&self.pool, id).await?)
    }

    async fn release_stale_claims(&self, older_than: Duration) -> Result<u64, StoreError> {
        Ok(queries::release_stale_claims(&self.pool, older_than.as_secs_f64()).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
