//! Flags production orders that carry no facility code, which downstream
//! scheduling views can't group. A placeholder rule illustrating the
//! registry, not the production detector set.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;

use snapforge_common::types::EnvTag;
use snapforge_common::{Result, SnapError};

use crate::db::issues;
use crate::detectors::Detector;

pub struct MissingFacilityDetector;

#[async_trait]
impl Detector for MissingFacilityDetector {
    fn name(&self) -> &'static str {
        "missing_facility"
    }

    async fn run(&self, pool: &PgPool, env: EnvTag) -> Result<()> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT production_order
            FROM production_order_view
            WHERE env = $1 AND (facility IS NULL OR facility = '')
            "#,
        )
        .bind(env.to_string())
        .fetch_all(pool)
        .await
        .map_err(|e| SnapError::Database(e.to_string()))?;

        for (production_order,) in rows {
            issues::record_issue(pool, env, &production_order, self.name(), json!({})).await?;
        }

        Ok(())
    }
}
