//! Flags planned orders that have sat un-released past a fixed threshold.
//! A placeholder rule: the real threshold and the "released" signal are
//! planning-domain decisions outside this repository's scope.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

use snapforge_common::types::EnvTag;
use snapforge_common::{Result, SnapError};

use crate::db::issues;
use crate::detectors::Detector;

const STALE_AFTER_DAYS: i64 = 30;

pub struct StalePlannedOrderDetector;

#[async_trait]
impl Detector for StalePlannedOrderDetector {
    fn name(&self) -> &'static str {
        "stale_planned_order"
    }

    async fn run(&self, pool: &PgPool, env: EnvTag) -> Result<()> {
        // change_ts is the warehouse's YYYYMMDD integer, not a timestamp.
        let cutoff: i64 = (Utc::now() - Duration::days(STALE_AFTER_DAYS))
            .format("%Y%m%d")
            .to_string()
            .parse()
            .unwrap_or(0);

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT production_order, change_ts
            FROM production_order_view
            WHERE env = $1 AND source = 'mop' AND change_ts < $2
            "#,
        )
        .bind(env.to_string())
        .bind(cutoff)
        .fetch_all(pool)
        .await
        .map_err(|e| SnapError::Database(e.to_string()))?;

        for (production_order, change_ts) in rows {
            issues::record_issue(
                pool,
                env,
                &production_order,
                self.name(),
                json!({ "changeTs": change_ts, "staleAfterDays": STALE_AFTER_DAYS }),
            )
            .await?;
        }

        Ok(())
    }
}
