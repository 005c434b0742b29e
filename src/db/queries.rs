use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::models::task::{Task, TaskRequest, TaskResult, TaskStatus};

const TASK_COLUMNS: &str =
    "id, request, status, result, failure_detail, created_at, updated_at, claimed_at";

fn task_from_row(row: &PgRow) -> Result<Task, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = TaskStatus::from_str(&status).map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: Box::new(e),
    })?;
    let Json(request): Json<TaskRequest> = row.try_get("request")?;
    let result: Option<Json<TaskResult>> = row.try_get("result")?;

    Ok(Task {
        id: row.try_get("id")?,
        request,
        status,
        result: result.map(|Json(r)| r),
        failure_detail: row.try_get("failure_detail")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        claimed_at: row.try_get("claimed_at")?,
    })
}

/// Insert a pending task. Returns false if the id is already taken.
pub async fn insert_task(pool: &PgPool, task: &Task) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO tasks (id, request, status, created_at, updated_at)
        VALUES ($1, $2, 'pending', $3, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&task.id)
    .bind(Json(&task.request))
    .bind(task.created_at)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted == 1)
}

/// Get a task by id
pub async fn get_task(pool: &PgPool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// Pending tasks in insertion order
pub async fn get_pending_tasks(pool: &PgPool) -> Result<Vec<Task>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'pending' ORDER BY seq ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(task_from_row).collect()
}

/// "<user_id>/<camera>" for pending tasks, without reading image payloads
pub async fn get_pending_keys(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT COALESCE(request->>'user_id', '') || '/' || COALESCE(request->>'camera', '') AS key
        FROM tasks
        WHERE status = 'pending'
        ORDER BY seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(|r| r.try_get::<String, _>("key")).collect()
}

/// Claim the oldest pending task. Rows locked by a concurrent claim are
/// skipped, so two workers never receive the same task.
pub async fn claim_next_pending(pool: &PgPool) -> Result<Option<Task>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE tasks
        SET status = 'in_flight', claimed_at = NOW(), updated_at = NOW()
        WHERE id = (
            SELECT id FROM tasks
            WHERE status = 'pending'
            ORDER BY seq ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// Move a non-terminal task to `completed`. Returns false if no
/// non-terminal row with that id exists.
pub async fn complete_task(
    pool: &PgPool,
    id: &str,
    result: &TaskResult,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'completed', result = $2, updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'in_flight')
        "#,
    )
    .bind(id)
    .bind(Json(result))
    .execute(pool)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

/// Move a non-terminal task to `error`.
pub async fn fail_task(pool: &PgPool, id: &str, detail: &str) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'error', failure_detail = $2, updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'in_flight')
        "#,
    )
    .bind(id)
    .bind(detail)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

/// Current status of a task, if it exists
pub async fn get_task_status(pool: &PgPool, id: &str) -> Result<Option<TaskStatus>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(r) => {
            let status: String = r.try_get("status")?;
            TaskStatus::from_str(&status)
                .map(Some)
                .map_err(|e| sqlx::Error::ColumnDecode {
                    index: "status".to_string(),
                    source: Box::new(e),
                })
        }
        None => Ok(None),
    }
}

/// Return claims older than `older_than_secs` to the pending pool
pub async fn release_stale_claims(pool: &PgPool, older_than_secs: f64) -> Result<u64, sqlx::Error> {
    let released = sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'pending', claimed_at = NULL, updated_at = NOW()
        WHERE status = 'in_flight'
          AND claimed_at <= NOW() - make_interval(secs => $1)
        "#,
    )
    .bind(older_than_secs)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(released)
}
