//! Persistence for refresh jobs and bulk operation jobs.
//!
//! Mirrors the job bookkeeping the ingestion framework's coordinator used to
//! do for ingestion jobs, generalized to the two job kinds this engine runs:
//! snapshot refreshes and bulk operations. Every mutating method here is
//! idempotent with respect to a job already in a terminal state — a late
//! retry or a duplicate bus message must never resurrect a completed or
//! failed job.

use chrono::Utc;
use serde_json::Value as Json;
use sqlx::PgPool;
use uuid::Uuid;

use snapforge_common::types::{
    BulkOpJob, BulkOpStatus, BulkOperationType, EnvTag, RecordCounts, RefreshJob, RefreshStatus,
};

use crate::db::{DbError, DbResult};

/// Create a new refresh job row in `queued` status and return its id.
pub async fn start_refresh_job(pool: &PgPool, env: EnvTag) -> DbResult<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO refresh_jobs
            (id, env, status, current_step, completed_steps, total_steps,
             mo_count, mop_count, co_count, records_per_sec, eta_seconds,
             retry_count, max_retries, last_error, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 0, 5, 0, 0, 0, 0.0, NULL, 0, $5, NULL, $6, $6)
        "#,
    )
    .bind(id)
    .bind(env.to_string())
    .bind(RefreshStatus::Queued.to_string())
    .bind("queued")
    .bind(3i32)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Create a new bulk-operation job row in `queued` status and return its id.
pub async fn start_bulk_op_job(
    pool: &PgPool,
    env: EnvTag,
    operation: BulkOperationType,
    issue_ids: &[i64],
) -> DbResult<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let issue_ids_json = Json::from(issue_ids.to_vec());

    sqlx::query(
        r#"
        INSERT INTO bulk_op_jobs
            (id, env, operation, issue_ids, status, batch_size, total_batches,
             completed_batches, last_error, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 0, 0, 0, NULL, $6, $6)
        "#,
    )
    .bind(id)
    .bind(env.to_string())
    .bind(operation.to_string())
    .bind(issue_ids_json)
    .bind(BulkOpStatus::Queued.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Fetch a refresh job by id.
pub async fn get_refresh_job(pool: &PgPool, id: Uuid) -> DbResult<RefreshJob> {
    let row = sqlx::query_as::<_, RefreshJobRow>(
        r#"
        SELECT id, env, status, current_step, completed_steps, total_steps,
               mo_count, mop_count, co_count, records_per_sec, eta_seconds,
               retry_count, max_retries, last_error, created_at, updated_at
        FROM refresh_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("refresh_job", &id.to_string()))?;

    row.try_into_domain()
}

/// Fetch a bulk-operation job by id.
pub async fn get_bulk_op_job(pool: &PgPool, id: Uuid) -> DbResult<BulkOpJob> {
    let row = sqlx::query_as::<_, BulkOpJobRow>(
        r#"
        SELECT id, env, operation, issue_ids, status, batch_size, total_batches,
               completed_batches, last_error, created_at, updated_at
        FROM bulk_op_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("bulk_op_job", &id.to_string()))?;

    row.try_into_domain()
}

/// Advance the `current_step`/`completed_steps` counters for a refresh job.
/// No-ops (returns `Ok` without writing) if the job is already terminal.
pub async fn update_refresh_progress(
    pool: &PgPool,
    id: Uuid,
    current_step: &str,
    completed_steps: u32,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET current_step = $2, completed_steps = $3, updated_at = $4
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(current_step)
    .bind(completed_steps as i32)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Transition a refresh job to a new status. No-ops on a terminal job.
pub async fn set_refresh_status(pool: &PgPool, id: Uuid, status: RefreshStatus) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET status = $2, updated_at = $3
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(status.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the record counts produced by the phase workers.
pub async fn update_record_counts(pool: &PgPool, id: Uuid, counts: RecordCounts) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET mo_count = $2, mop_count = $3, co_count = $4, updated_at = $5
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(counts.mos)
    .bind(counts.mops)
    .bind(counts.cos)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record an observed throughput and recompute the ETA estimate.
pub async fn update_throughput(
    pool: &PgPool,
    id: Uuid,
    records_per_sec: f64,
    eta_seconds: Option<i64>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET records_per_sec = $2, eta_seconds = $3, updated_at = $4
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(records_per_sec)
    .bind(eta_seconds)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Increment the retry counter and stash the triggering error.
pub async fn increment_retry(pool: &PgPool, id: Uuid, error: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET retry_count = retry_count + 1, last_error = $2, updated_at = $3
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a refresh job completed. Idempotent — a second call is a no-op.
pub async fn complete_refresh_job(pool: &PgPool, id: Uuid) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET status = 'completed', current_step = 'completed', completed_steps = total_steps,
            updated_at = $2
        WHERE id = $1
          AND status != 'completed'
        "#,
    )
    .bind(id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a refresh job failed with the given terminal error. Idempotent.
pub async fn fail_refresh_job(pool: &PgPool, id: Uuid, error: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_jobs
        SET status = 'failed', last_error = $2, updated_at = $3
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Update bulk-op batch bookkeeping (total batches known, or one more done).
pub async fn update_bulk_op_batches(
    pool: &PgPool,
    id: Uuid,
    total_batches: u32,
    completed_batches: u32,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE bulk_op_jobs
        SET total_batches = $2, completed_batches = $3, updated_at = $4
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(total_batches as i32)
    .bind(completed_batches as i32)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Transition a bulk-op job to a new status. No-ops on a terminal job.
pub async fn set_bulk_op_status(pool: &PgPool, id: Uuid, status: BulkOpStatus) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE bulk_op_jobs
        SET status = $2, updated_at = $3
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(status.to_string())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a bulk-op job completed. Idempotent.
pub async fn complete_bulk_op_job(pool: &PgPool, id: Uuid) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE bulk_op_jobs
        SET status = 'completed', completed_batches = total_batches, updated_at = $2
        WHERE id = $1
          AND status != 'completed'
        "#,
    )
    .bind(id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a bulk-op job failed. Idempotent.
pub async fn fail_bulk_op_job(pool: &PgPool, id: Uuid, error: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE bulk_op_jobs
        SET status = 'failed', last_error = $2, updated_at = $3
        WHERE id = $1
          AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// List refresh jobs, optionally filtered by status and/or environment.
/// Filters are bound parameters, never interpolated into the query text.
pub async fn list_refresh_jobs(
    pool: &PgPool,
    status: Option<&str>,
    env: Option<&str>,
    limit: i64,
    offset: i64,
) -> DbResult<Vec<RefreshJob>> {
    let rows = sqlx::query_as::<_, RefreshJobRow>(
        r#"
        SELECT id, env, status, current_step, completed_steps, total_steps,
               mo_count, mop_count, co_count, records_per_sec, eta_seconds,
               retry_count, max_retries, last_error, created_at, updated_at
        FROM refresh_jobs
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR env = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(status)
    .bind(env)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into_domain()).collect()
}

/// List bulk-operation jobs, optionally filtered by status and/or environment.
pub async fn list_bulk_op_jobs(
    pool: &PgPool,
    status: Option<&str>,
    env: Option<&str>,
    limit: i64,
    offset: i64,
) -> DbResult<Vec<BulkOpJob>> {
    let rows = sqlx::query_as::<_, BulkOpJobRow>(
        r#"
        SELECT id, env, operation, issue_ids, status, batch_size, total_batches,
               completed_batches, last_error, created_at, updated_at
        FROM bulk_op_jobs
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR env = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(status)
    .bind(env)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into_domain()).collect()
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshJobRow {
    id: Uuid,
    env: String,
    status: String,
    current_step: String,
    completed_steps: i32,
    total_steps: i32,
    mo_count: i64,
    mop_count: i64,
    co_count: i64,
    records_per_sec: f64,
    eta_seconds: Option<i64>,
    retry_count: i32,
    max_retries: i32,
    last_error: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl RefreshJobRow {
    fn try_into_domain(self) -> DbResult<RefreshJob> {
        let env = self
            .env
            .parse()
            .map_err(|_| DbError::config(format!("invalid env tag in row: {}", self.env)))?;
        let status = self
            .status
            .parse()
            .map_err(|_| DbError::config(format!("invalid status in row: {}", self.status)))?;

        Ok(RefreshJob {
            id: self.id,
            env,
            status,
            current_step: self.current_step,
            completed_steps: self.completed_steps.max(0) as u32,
            total_steps: self.total_steps.max(0) as u32,
            counts: RecordCounts {
                cos: self.co_count,
                mos: self.mo_count,
                mops: self.mop_count,
            },
            records_per_sec: self.records_per_sec,
            eta_seconds: self.eta_seconds,
            retry_count: self.retry_count.max(0) as u32,
            max_retries: self.max_retries.max(0) as u32,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BulkOpJobRow {
    id: Uuid,
    env: String,
    operation: String,
    issue_ids: Json,
    status: String,
    batch_size: i32,
    total_batches: i32,
    completed_batches: i32,
    last_error: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl BulkOpJobRow {
    fn try_into_domain(self) -> DbResult<BulkOpJob> {
        let env = self
            .env
            .parse()
            .map_err(|_| DbError::config(format!("invalid env tag in row: {}", self.env)))?;
        let operation = self.operation.parse().map_err(|_| {
            DbError::config(format!("invalid bulk op type in row: {}", self.operation))
        })?;
        let status = self
            .status
            .parse()
            .map_err(|_| DbError::config(format!("invalid status in row: {}", self.status)))?;
        let issue_ids: Vec<i64> = serde_json::from_value(self.issue_ids)
            .map_err(|e| DbError::config(format!("invalid issue_ids json: {e}")))?;

        Ok(BulkOpJob {
            id: self.id,
            env,
            operation,
            issue_ids,
            status,
            batch_size: self.batch_size.max(0) as u32,
            total_batches: self.total_batches.max(0) as u32,
            completed_batches: self.completed_batches.max(0) as u32,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
