//! Rebuild of the unified production-order view consumed by downstream
//! bulk operations.
//!
//! A production order can exist as a planned manufacturing order (MOP) or
//! a released manufacturing order (MO) sharing the same order number; a
//! release retires the MOP row and a matching MO row appears in its place.
//! The finalize step rebuilds `production_order_view` from scratch for the
//! refreshed environment by upserting MOPs first and MOs second, so that
//! when both exist under the same key the MO row wins — it always reflects
//! the more current state of the order.

use sqlx::PgPool;

use snapforge_common::types::EnvTag;

use crate::db::DbResult;

/// Rebuild `production_order_view` for one environment from the freshly
/// loaded MOP and MO snapshot tables. Must run after both phases have
/// completed and committed, inside the coordinator's `finalizing` step.
pub async fn rebuild(pool: &PgPool, env: EnvTag) -> DbResult<()> {
    let env = env.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM production_order_view WHERE env = $1")
        .bind(&env)
        .execute(&mut *tx)
        .await?;

    // MOPs first: planned orders seed the view.
    sqlx::query(
        r#"
        INSERT INTO production_order_view
            (env, production_order, company, facility, source, change_ts, deleted, payload)
        SELECT env, natural_key, company, facility, 'mop', change_ts, deleted, payload
        FROM snapshot_planned_orders
        WHERE env = $1 AND deleted = false
        ON CONFLICT (env, production_order) DO UPDATE SET
            company = EXCLUDED.company,
            facility = EXCLUDED.facility,
            source = EXCLUDED.source,
            change_ts = EXCLUDED.change_ts,
            deleted = EXCLUDED.deleted,
            payload = EXCLUDED.payload
        "#,
    )
    .bind(&env)
    .execute(&mut *tx)
    .await?;

    // MOs second: a released order overwrites its planned predecessor under
    // the same production order number.
    sqlx::query(
        r#"
        INSERT INTO production_order_view
            (env, production_order, company, facility, source, change_ts, deleted, payload)
        SELECT env, natural_key, company, facility, 'mo', change_ts, deleted, payload
        FROM snapshot_manufacturing_orders
        WHERE env = $1 AND deleted = false
        ON CONFLICT (env, production_order) DO UPDATE SET
            company = EXCLUDED.company,
            facility = EXCLUDED.facility,
            source = EXCLUDED.source,
            change_ts = EXCLUDED.change_ts,
            deleted = EXCLUDED.deleted,
            payload = EXCLUDED.payload
        "#,
    )
    .bind(&env)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_tag_formats_for_sql_binds() {
        assert_eq!(EnvTag::Trn.to_string(), "TRN");
        assert_eq!(EnvTag::Prd.to_string(), "PRD");
    }
}
