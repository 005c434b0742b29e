//! In-memory task store.
//!
//! A single mutex serializes every operation, which makes claiming atomic.
//! Pending and claimed positions are indexed so claims never rescan finished
//! history, and finished tasks drop their image payloads. Nothing survives a
//! restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{check_finish, StoreError, TaskStore};
use crate::models::task::{Task, TaskResult, TaskStatus};

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order.
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    pending: BTreeSet<usize>,
    in_flight: BTreeSet<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(poison_err)
    }

    fn finish(
        &self,
        id: &str,
        to: TaskStatus,
        apply: impl FnOnce(&mut Task),
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let pos = *inner
            .index
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        check_finish(id, inner.tasks[pos].status, to)?;
        inner.pending.remove(&pos);
        inner.in_flight.remove(&pos);

        let task = &mut inner.tasks[pos];
        task.status = to;
        task.updated_at = Utc::now();
        // Terminal tasks keep status and result only.
        task.request.images = Vec::new();
        apply(task);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: Task) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.index.contains_key(&task.id) {
            return Ok(false);
        }
        let pos = inner.tasks.len();
        inner.index.insert(task.id.clone(), pos);
        inner.pending.insert(pos);
        inner.tasks.push(Task {
            status: TaskStatus::Pending,
            ..task
        });
        Ok(true)
    }

    async fn find_pending(&self) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .pending
            .iter()
            .map(|&pos| inner.tasks[pos].clone())
            .collect())
    }

    async fn pending_keys(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .pending
            .iter()
            .map(|&pos| inner.tasks[pos].request.display_key())
            .collect())
    }

    async fn claim_next_pending(&self) -> Result<Option<Task>, StoreError> {
        let mut inner = self.lock()?;
        let Some(pos) = inner.pending.pop_first() else {
            return Ok(None);
        };
        inner.in_flight.insert(pos);

        let now = Utc::now();
        let task = &mut inner.tasks[pos];
        task.status = TaskStatus::InFlight;
        task.claimed_at = Some(now);
        task.updated_at = now;
        Ok(Some(task.clone()))
    }

    async fn complete(&self, id: &str, result: &TaskResult) -> Result<(), StoreError> {
        self.finish(id, TaskStatus::Completed, |task| {
            task.result = Some(result.clone());
        })
    }

    async fn fail(&self, id: &str, detail: &str) -> Result<(), StoreError> {
        self.finish(id, TaskStatus::Error, |task| {
            task.failure_detail = Some(detail.to_string());
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.index.get(id).map(|&pos| inner.tasks[pos].clone()))
    }

    async fn release_stale_claims(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut inner = self.lock()?;

        let stale: Vec<usize> = inner
            .in_flight
            .iter()
            .copied()
            .filter(|&pos| inner.tasks[pos].claimed_at.is_some_and(|at| at <= cutoff))
            .collect();

        let now = Utc::now();
        for &pos in &stale {
            inner.in_flight.remove(&pos);
            inner.pending.insert(pos);
            let task = &mut inner.tasks[pos];
            task.status = TaskStatus::Pending;
            task.claimed_at = None;
            task.updated_at = now;
        }
        Ok(stale.len() as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
