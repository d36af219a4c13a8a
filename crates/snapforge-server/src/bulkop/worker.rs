//! Consumes one [`BulkOpBatch`] at a time from the shared batch subject,
//! executes the job's operation against each production order through
//! [`M3Client`], gated by the per-environment [`RateLimiter`], and publishes
//! exactly one [`BulkOpBatchResult`].
//!
//! Listens for a per-job cancellation broadcast while working a batch: on
//! receipt, the worker stops issuing new M3 calls for that job but still
//! reports whatever orders it already completed, matching §5's "partial
//! batch results remain persisted."

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use snapforge_common::types::BulkOpBatch;
use snapforge_common::Result;

use crate::bulkop::m3_client::M3Client;
use crate::bulkop::rate_limiter::RateLimiter;
use crate::bus::{publish_json, recv_json, subjects, MessageBus};
use crate::db::job_store;

pub struct BulkOpWorker {
    pool: PgPool,
    bus: Arc<dyn MessageBus>,
    rate_limiter: Arc<RateLimiter>,
    m3: M3Client,
}

impl BulkOpWorker {
    pub fn new(pool: PgPool, bus: Arc<dyn MessageBus>, rate_limiter: Arc<RateLimiter>, m3: M3Client) -> Self {
        Self {
            pool,
            bus,
            rate_limiter,
            m3,
        }
    }

    /// Join the shared batch queue group and process batches until the bus
    /// closes the subscription.
    pub async fn run(&self) -> Result<()> {
        let mut batches = self
            .bus
            .queue_subscribe(subjects::BULK_OP_BATCH_SUBJECT, subjects::BULK_OP_WORKER_GROUP)
            .await?;

        while let Some(batch) = recv_json::<BulkOpBatch>(&mut batches).await {
            self.process(batch).await;
        }

        Ok(())
    }

    async fn process(&self, batch: BulkOpBatch) {
        let job_id = batch.job_id;

        let job = match job_store::get_bulk_op_job(&self.pool, job_id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job_id, batch_index = batch.batch_index, error = %e, "bulk op worker could not load job, dropping batch");
                return;
            }
        };

        let cancel = CancellationToken::new();
        let mut cancel_sub = match self.bus.subscribe(&subjects::bulk_op_cancel_subject(job_id)).await {
            Ok(sub) => Some(sub),
            Err(_) => None,
        };

        if let Some(mut sub) = cancel_sub.take() {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if sub.recv().await.is_some() {
                    cancel.cancel();
                }
            });
        }

        let mut order_outcomes = Vec::with_capacity(batch.production_orders.len());
        for order in &batch.production_orders {
            if cancel.is_cancelled() {
                order_outcomes.push((order.clone(), false, Some("cancelled".to_string())));
                continue;
            }

            self.rate_limiter.wait(job.env).await;

            match self.m3.execute(job.operation, order).await {
                Ok(()) => order_outcomes.push((order.clone(), true, None)),
                Err(e) => order_outcomes.push((order.clone(), false, Some(e.to_string()))),
            }
        }

        let result = snapforge_common::types::BulkOpBatchResult {
            job_id,
            batch_index: batch.batch_index,
            order_outcomes,
        };

        if let Err(e) = publish_json(
            self.bus.as_ref(),
            &subjects::bulk_op_result_subject(job_id),
            &result,
        )
        .await
        {
            tracing::error!(job_id = %job_id, batch_index = batch.batch_index, error = %e, "failed to publish batch result");
        }
    }
}
