//! Drives one bulk operation job: resolve issue ids to production orders,
//! partition into batches, fan them out, aggregate per-batch results, then
//! expand back to per-issue results with primary/duplicate tagging.
//!
//! Same shape as [`crate::snapshot::coordinator::SnapshotCoordinator`] —
//! resolve once, fan out, wait for completions, finalize — generalized from
//! a fixed three-phase fan-out to an N-batch one sized by the execution set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::timeout;
use uuid::Uuid;

use snapforge_common::types::{
    BulkOpBatch, BulkOpBatchResult, BulkOpIssueResult, BulkOpStatus, BulkOperationType, EnvTag,
};
use snapforge_common::{Result, SnapError};

use crate::bus::{publish_json, recv_json, subjects, MessageBus};
use crate::db::{audit, issues, job_store};

#[derive(Debug, Clone)]
pub struct BulkOpCoordinatorConfig {
    pub batch_size: u32,
    pub batch_wait_timeout: Duration,
}

pub struct BulkOpCoordinator {
    pool: sqlx::PgPool,
    bus: Arc<dyn MessageBus>,
    config: BulkOpCoordinatorConfig,
}

impl BulkOpCoordinator {
    pub fn new(pool: sqlx::PgPool, bus: Arc<dyn MessageBus>, config: BulkOpCoordinatorConfig) -> Self {
        Self { pool, bus, config }
    }

    /// Start a bulk operation against `issue_ids` and drive it to completion
    /// (or failure) on the caller's task, returning the job id immediately
    /// after it's persisted.
    pub async fn run_bulk_op(
        &self,
        env: EnvTag,
        operation: BulkOperationType,
        issue_ids: Vec<i64>,
    ) -> Result<Uuid> {
        let job_id = job_store::start_bulk_op_job(&self.pool, env, operation, &issue_ids).await?;
        audit::record(
            &self.pool,
            "bulk_op.started",
            job_id,
            env,
            serde_json::json!({ "operation": operation.to_string(), "issue_count": issue_ids.len() }),
        )
        .await
        .ok();

        if let Err(e) = self.drive(job_id, env, operation, &issue_ids).await {
            tracing::error!(job_id = %job_id, error = %e, "bulk operation job failed");
            job_store::fail_bulk_op_job(&self.pool, job_id, &e.to_string()).await?;
            audit::record(
                &self.pool,
                "bulk_op.failed",
                job_id,
                env,
                serde_json::json!({ "error": e.to_string() }),
            )
            .await
            .ok();
            self.publish_progress(job_id).await.ok();
            return Err(e);
        }

        Ok(job_id)
    }

    async fn drive(
        &self,
        job_id: Uuid,
        env: EnvTag,
        operation: BulkOperationType,
        issue_ids: &[i64],
    ) -> Result<()> {
        // Step 1: resolve issue ids to (issue, productionOrder) pairs. No
        // de-dup at this stage — the primary/duplicate index below is built
        // from this raw mapping set on purpose (§9).
        job_store::set_bulk_op_status(&self.pool, job_id, BulkOpStatus::Resolving).await?;
        self.publish_progress(job_id).await.ok();

        let resolved = issues::resolve_issues(&self.pool, issue_ids).await?;
        if resolved.is_empty() {
            return Err(SnapError::NotFound(format!(
                "none of the {} issue ids resolved to a known issue",
                issue_ids.len()
            )));
        }

        // Step 2: build the many-to-one index and pick a primary issue per
        // order (first encountered).
        let mut order_to_issues: IndexMap<String, Vec<i64>> = IndexMap::new();
        for issue in &resolved {
            order_to_issues
                .entry(issue.production_order.clone())
                .or_default()
                .push(issue.id);
        }

        // Step 3 & 4: the execution set is the unique orders; partition into
        // fixed-size batches.
        job_store::set_bulk_op_status(&self.pool, job_id, BulkOpStatus::Batching).await?;
        self.publish_progress(job_id).await.ok();

        let execution_set: Vec<String> = order_to_issues.keys().cloned().collect();
        let batch_size = self.config.batch_size.max(1) as usize;
        let batches: Vec<Vec<String>> = execution_set
            .chunks(batch_size)
            .map(|c| c.to_vec())
            .collect();
        let total_batches = batches.len() as u32;

        job_store::update_bulk_op_batches(&self.pool, job_id, total_batches, 0).await?;

        // Step 5 & 6: subscribe to this job's result subject, then publish
        // one batch per chunk onto the shared worker queue.
        job_store::set_bulk_op_status(&self.pool, job_id, BulkOpStatus::Running).await?;
        self.publish_progress(job_id).await.ok();

        let mut results_sub = self
            .bus
            .subscribe(&subjects::bulk_op_result_subject(job_id))
            .await?;

        for (index, batch) in batches.iter().enumerate() {
            let batch_msg = BulkOpBatch {
                job_id,
                batch_index: index as u32,
                production_orders: batch.clone(),
            };
            publish_json(
                self.bus.as_ref(),
                subjects::BULK_OP_BATCH_SUBJECT,
                &batch_msg,
            )
            .await?;
        }

        // Step 7: aggregate completions, tracking per-order outcomes.
        let mut order_outcomes: HashMap<String, (bool, Option<String>)> = HashMap::new();
        let mut completed_batches = 0u32;

        while completed_batches < total_batches {
            let result = timeout(
                self.config.batch_wait_timeout,
                recv_json::<BulkOpBatchResult>(&mut results_sub),
            )
            .await
            .map_err(|_| {
                SnapError::TransientWarehouse(format!(
                    "timed out waiting for batch completions: {completed_batches}/{total_batches} done"
                ))
            })?
            .ok_or_else(|| SnapError::Bus("batch result channel closed".to_string()))?;

            if result.job_id != job_id {
                continue;
            }

            for (order, success, error) in result.order_outcomes {
                order_outcomes.insert(order, (success, error));
            }

            completed_batches += 1;
            job_store::update_bulk_op_batches(&self.pool, job_id, total_batches, completed_batches)
                .await?;
            self.publish_progress(job_id).await.ok();
        }

        // Step 8: expand order-level results back to issue-level results,
        // tagging every non-primary issue as a duplicate of the first issue
        // seen for its order.
        job_store::set_bulk_op_status(&self.pool, job_id, BulkOpStatus::Expanding).await?;
        self.publish_progress(job_id).await.ok();

        let mut issue_results = Vec::new();
        for (order, issue_ids_for_order) in &order_to_issues {
            let (success, error) = order_outcomes
                .get(order)
                .cloned()
                .unwrap_or((false, Some("no batch result reported for this order".to_string())));

            let primary_issue_id = issue_ids_for_order[0];
            for (i, issue_id) in issue_ids_for_order.iter().enumerate() {
                issue_results.push(BulkOpIssueResult {
                    job_id,
                    issue_id: *issue_id,
                    production_order: order.clone(),
                    success,
                    error: error.clone(),
                    is_primary: i == 0,
                    primary_issue_id: if i == 0 { None } else { Some(primary_issue_id) },
                });
            }
        }

        issues::insert_issue_results(&self.pool, job_id, &issue_results).await?;

        job_store::complete_bulk_op_job(&self.pool, job_id).await?;
        audit::record(
            &self.pool,
            "bulk_op.completed",
            job_id,
            env,
            serde_json::json!({ "issues_expanded": issue_results.len() }),
        )
        .await
        .ok();
        self.publish_progress(job_id).await.ok();

        Ok(())
    }

    async fn publish_progress(&self, job_id: Uuid) -> Result<()> {
        let job = job_store::get_bulk_op_job(&self.pool, job_id).await?;
        publish_json(
            self.bus.as_ref(),
            &subjects::bulk_op_progress_subject(job_id),
            &job,
        )
        .await
    }
}
