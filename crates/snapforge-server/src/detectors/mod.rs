//! Pluggable post-load issue detection.
//!
//! Individual detector business logic is an external collaborator this
//! repository doesn't own; the two detectors below are illustrative
//! placeholders exercising the registry, not the production rule set. A
//! detector's only contract is: read `production_order_view` (and whatever
//! else it needs) for one environment, and record zero or more issues.
//! Failures are logged by [`run_all`] and never propagate to the caller —
//! the refresh that triggered detection has already completed regardless.

mod missing_facility;
mod stale_planned_order;

use async_trait::async_trait;
use sqlx::PgPool;

use snapforge_common::types::EnvTag;
use snapforge_common::Result;

#[async_trait]
pub trait Detector: Send + Sync {
    /// Short, stable name stored alongside issues this detector records.
    fn name(&self) -> &'static str;

    /// Scan `env` and record any issues found via [`crate::db::issues`].
    async fn run(&self, pool: &PgPool, env: EnvTag) -> Result<()>;
}

fn registry() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(stale_planned_order::StalePlannedOrderDetector),
        Box::new(missing_facility::MissingFacilityDetector),
    ]
}

/// Run every registered detector against `env`. A single detector's error is
/// logged and does not stop the others from running; the aggregate error
/// (if any) is returned so the caller can log a summary, but it must never
/// be treated as fatal to the refresh.
pub async fn run_all(pool: &PgPool, env: EnvTag) -> Result<()> {
    let mut first_error = None;

    for detector in registry() {
        if let Err(e) = detector.run(pool, env).await {
            tracing::warn!(detector = detector.name(), env = %env, error = %e, "detector run failed");
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
