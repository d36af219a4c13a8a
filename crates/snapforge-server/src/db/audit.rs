//! Database-backed audit trail for phase/bulk-op lifecycle transitions.
//!
//! Generalizes the teacher's `bdp-server::audit` module — which logged
//! command-style HTTP writes — to this engine's own state-mutating events:
//! there are no UI-facing write routes here (request intake is a non-goal),
//! so the coordinators log their own status transitions directly instead of
//! through a request-auditing middleware layer.

use chrono::Utc;
use serde_json::Value as Json;
use sqlx::PgPool;
use uuid::Uuid;

use snapforge_common::types::EnvTag;

use crate::db::DbResult;

/// Record one lifecycle transition. Best-effort: callers should treat a
/// failure here as non-fatal to the transition itself, the same way a
/// detector failure doesn't fail a refresh.
pub async fn record(
    pool: &PgPool,
    action: &str,
    job_id: Uuid,
    env: EnvTag,
    detail: Json,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (occurred_at, action, job_id, env, detail)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Utc::now())
    .bind(action)
    .bind(job_id)
    .bind(env.to_string())
    .bind(detail)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_formats_for_bind() {
        assert_eq!(EnvTag::Trn.to_string(), "TRN");
    }
}
