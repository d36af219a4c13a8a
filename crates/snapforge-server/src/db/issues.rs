//! Detected issues and the per-issue results a bulk operation produces.
//!
//! `detected_issues` is written by the detector framework after a refresh's
//! finalize step; the bulk-op coordinator only ever reads from it, to
//! resolve the issue ids a request references back to production orders.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use snapforge_common::types::{BulkOpIssueResult, EnvTag};

use crate::db::DbResult;

/// One row a detector produced: a finding pointing at a production order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DetectedIssue {
    pub id: i64,
    pub env: String,
    pub production_order: String,
    pub kind: String,
}

/// Record a detector finding. Detectors call this once per finding; the
/// framework's runner does not deduplicate, it is up to each detector's own
/// query to avoid raising the same finding twice in a run.
pub async fn record_issue(
    pool: &PgPool,
    env: EnvTag,
    production_order: &str,
    kind: &str,
    detail: serde_json::Value,
) -> DbResult<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO detected_issues (env, production_order, kind, detail, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(env.to_string())
    .bind(production_order)
    .bind(kind)
    .bind(detail)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Resolve a list of issue ids to `(issue, productionOrder)` pairs, in the
/// same order as `issue_ids`. No de-duplication here — the bulk-op
/// coordinator needs the raw mapping set, in input order, to build its own
/// primary/duplicate index (§4.7 step 2 & §9): "primary issue = first
/// encountered" depends on that order, and `id = ANY($1)` alone only
/// guarantees table/index order, not input order.
pub async fn resolve_issues(pool: &PgPool, issue_ids: &[i64]) -> DbResult<Vec<DetectedIssue>> {
    if issue_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, DetectedIssue>(
        r#"
        SELECT d.id, d.env, d.production_order, d.kind
        FROM detected_issues d
        JOIN unnest($1::bigint[]) WITH ORDINALITY AS req(id, ord) ON req.id = d.id
        ORDER BY req.ord
        "#,
    )
    .bind(issue_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Insert every issue-level result for a bulk-op job in a single
/// transaction, matching §4.7 step 8's "insert all issue results
/// atomically."
pub async fn insert_issue_results(
    pool: &PgPool,
    job_id: Uuid,
    results: &[BulkOpIssueResult],
) -> DbResult<()> {
    if results.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for result in results {
        sqlx::query(
            r#"
            INSERT INTO bulk_op_issue_results
                (job_id, issue_id, production_order, success, error, is_primary, primary_issue_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (job_id, issue_id) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(result.issue_id)
        .bind(&result.production_order)
        .bind(result.success)
        .bind(&result.error)
        .bind(result.is_primary)
        .bind(result.primary_issue_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
