//! Truncate-and-reload persistence for the four snapshot tables a refresh
//! writes into: planned manufacturing orders, released manufacturing
//! orders, customer order lines, and pre-allocations.
//!
//! Mirrors the ingestion framework's `stage_records` pattern — batched
//! inserts inside a single transaction — generalized from "stage then swap"
//! to "truncate then upsert" since a refresh always replaces the full
//! snapshot for its environment rather than appending work-unit chunks.

use sqlx::PgPool;

use snapforge_common::types::{EnvTag, Phase, SnapshotRow, SnapshotRowKind};

use crate::db::DbResult;

/// Number of rows written per `INSERT` statement. Keeps each statement well
/// under Postgres's bind-parameter limit while still batching.
const UPSERT_CHUNK_SIZE: usize = 500;

fn table_for(kind: SnapshotRowKind) -> &'static str {
    match kind {
        SnapshotRowKind::PlannedOrder => "snapshot_planned_orders",
        SnapshotRowKind::ManufacturingOrder => "snapshot_manufacturing_orders",
        SnapshotRowKind::CustomerOrderLine => "snapshot_customer_order_lines",
        SnapshotRowKind::PreAllocation => "snapshot_pre_allocations",
    }
}

fn table_for_phase(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::Mops => &["snapshot_planned_orders"],
        Phase::Mos => &["snapshot_manufacturing_orders"],
        Phase::Cos => &["snapshot_customer_order_lines", "snapshot_pre_allocations"],
    }
}

/// Truncate every table a phase owns, scoped to one environment. Run once
/// per refresh, before fan-out, inside the coordinator's `truncating` step.
pub async fn truncate_phase_tables(pool: &PgPool, env: EnvTag, phase: Phase) -> DbResult<()> {
    let env = env.to_string();
    for table in table_for_phase(phase) {
        sqlx::query(&format!("DELETE FROM {table} WHERE env = $1"))
            .bind(&env)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Upsert a batch of loaded rows into their owning snapshot table, keyed on
/// `(env, company, facility, natural_key)`. Rows are chunked to bound
/// statement size; each chunk commits as its own transaction so a mid-phase
/// failure loses at most one chunk of progress, matching the staging
/// framework's per-chunk commit behavior.
pub async fn upsert_snapshot_rows(
    pool: &PgPool,
    env: EnvTag,
    natural_key_field: &str,
    rows: &[SnapshotRow],
) -> DbResult<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let kind = rows[0].kind;
    let table = table_for(kind);
    let mut total = 0u64;

    for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
        let mut tx = pool.begin().await?;

        for row in chunk {
            let natural_key = row
                .extra
                .get(natural_key_field)
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            let result = sqlx::query(&format!(
                r#"
                INSERT INTO {table}
                    (env, company, facility, natural_key, change_ts, deleted, payload)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (env, company, facility, natural_key)
                DO UPDATE SET
                    change_ts = EXCLUDED.change_ts,
                    deleted = EXCLUDED.deleted,
                    payload = EXCLUDED.payload
                WHERE {table}.change_ts <= EXCLUDED.change_ts
                "#
            ))
            .bind(env.to_string())
            .bind(&row.company)
            .bind(&row.facility)
            .bind(natural_key)
            .bind(row.change_ts)
            .bind(row.deleted)
            .bind(&row.extra)
            .execute(&mut *tx)
            .await?;

            total += result.rows_affected();
        }

        tx.commit().await?;
    }

    Ok(total)
}
