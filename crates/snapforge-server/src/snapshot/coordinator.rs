//! Drives one refresh job through its state machine: truncate, fan out one
//! [`PhaseJob`] per phase, wait for all three [`PhaseCompletion`]s,
//! finalize the production-order view, run detectors, and complete.
//!
//! Generalizes the ingestion framework's `IngestionCoordinator` — which
//! owned one job's work-unit bookkeeping and progress aggregation — to a
//! fixed three-way fan-out instead of a dynamic work-unit count, since a
//! refresh always has exactly one phase job per [`Phase`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::timeout;
use uuid::Uuid;

use snapforge_common::types::{
    EnvTag, Phase, PhaseCompletion, PhaseJob, RecordCounts, RefreshStatus, TenantContext,
};
use snapforge_common::{Result, SnapError};

use crate::bus::{subjects, publish_json, recv_json, MessageBus};
use crate::db::{audit, job_store, production_order_view, snapshot_tables};

/// Base delay for the phase-retry backoff; doubled per attempt and capped,
/// with up to 50% jitter layered on top so a burst of failures across many
/// refresh jobs doesn't republish in lockstep.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

fn backoff_with_jitter(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    let capped = RETRY_BASE_DELAY.saturating_mul(1 << exponent).min(RETRY_MAX_DELAY);
    let jitter_fraction = rand::rng().random_range(0.0..0.5);
    capped.mul_f64(1.0 + jitter_fraction)
}

/// Tunables the coordinator needs that aren't persisted per job.
#[derive(Debug, Clone)]
pub struct SnapshotCoordinatorConfig {
    pub phase_wait_timeout: Duration,
    pub fanout_stagger: Duration,
}

pub struct SnapshotCoordinator {
    pool: sqlx::PgPool,
    bus: Arc<dyn MessageBus>,
    config: SnapshotCoordinatorConfig,
}

impl SnapshotCoordinator {
    pub fn new(
        pool: sqlx::PgPool,
        bus: Arc<dyn MessageBus>,
        config: SnapshotCoordinatorConfig,
    ) -> Self {
        Self { pool, bus, config }
    }

    /// Run a full refresh for `env`/`tenant` to completion (or failure),
    /// returning the job id immediately after it's persisted and driving
    /// the rest of the state machine on the caller's task.
    pub async fn run_refresh(&self, env: EnvTag, tenant: TenantContext, access_token: String) -> Result<Uuid> {
        let job_id = job_store::start_refresh_job(&self.pool, env).await?;
        audit::record(&self.pool, "refresh.started", job_id, env, serde_json::json!({}))
            .await
            .ok();

        if let Err(e) = self.drive(job_id, env, tenant, access_token).await {
            tracing::error!(job_id = %job_id, error = %e, "refresh job failed");
            job_store::fail_refresh_job(&self.pool, job_id, &e.to_string()).await?;
            audit::record(
                &self.pool,
                "refresh.failed",
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
        tenant: TenantContext,
        access_token: String,
    ) -> Result<()> {
        // Step 2 (checked up front): a job that already exhausted its
        // persisted retry budget — e.g. re-driven after a prior failed
        // attempt — must fail immediately rather than truncate and fan out
        // again.
        let job = job_store::get_refresh_job(&self.pool, job_id).await?;
        if !job.can_retry() {
            return Err(SnapError::Protocol(format!(
                "refresh job already exhausted its retry budget ({} of {} retries used)",
                job.retry_count, job.max_retries
            )));
        }
        let max_retries = job.max_retries;

        // Step 1: truncate every owned table before any phase starts
        // writing, so a retried refresh never sees a mix of old and new
        // rows within one phase's table.
        job_store::set_refresh_status(&self.pool, job_id, RefreshStatus::Truncating).await?;
        job_store::update_refresh_progress(&self.pool, job_id, "truncating", 1).await?;
        self.publish_progress(job_id).await.ok();

        for phase in Phase::ALL {
            snapshot_tables::truncate_phase_tables(&self.pool, env, phase).await?;
        }

        // Step 2: fan out, staggering publishes so the phase-worker queue
        // group round-robins across distinct workers instead of bursting
        // all three jobs onto whichever worker happens to be first to poll.
        job_store::set_refresh_status(&self.pool, job_id, RefreshStatus::FanningOut).await?;
        job_store::update_refresh_progress(&self.pool, job_id, "fanning_out", 2).await?;
        self.publish_progress(job_id).await.ok();

        let mut completion_sub = self
            .bus
            .subscribe(&subjects::phase_completion_subject(job_id))
            .await?;

        for phase in Phase::ALL {
            self.publish_phase_job(job_id, phase, env, &tenant, &access_token)
                .await?;
            tokio::time::sleep(self.config.fanout_stagger).await;
        }

        // Step 3: wait for all three phases, retrying a failed phase in
        // place up to its own budget before failing the whole refresh.
        job_store::set_refresh_status(&self.pool, job_id, RefreshStatus::WaitingPhases).await?;
        job_store::update_refresh_progress(&self.pool, job_id, "waiting_phases", 3).await?;
        self.publish_progress(job_id).await.ok();

        // `completed` is the sole source of truth for which phases are
        // done; `retry_counts` only tracks how many times a still-running
        // phase has failed. Keeping them separate means a stale or
        // duplicate completion for a phase already in `completed` can never
        // resurrect it, matching §4.5's "duplicate phase completions are
        // ignored once that phase is marked done".
        let mut completed: std::collections::HashSet<Phase> = std::collections::HashSet::new();
        let mut retry_counts: HashMap<Phase, u32> = HashMap::new();
        let mut counts = RecordCounts::default();
        let fanout_started_at = std::time::Instant::now();
        let total_phases = Phase::ALL.len() as f64;

        while completed.len() < Phase::ALL.len() {
            let completion = timeout(self.config.phase_wait_timeout, recv_json::<PhaseCompletion>(&mut completion_sub))
                .await
                .map_err(|_| {
                    SnapError::TransientWarehouse(format!(
                        "timed out waiting for phase completions: {:?} still outstanding",
                        Phase::ALL.iter().filter(|p| !completed.contains(p)).collect::<Vec<_>>()
                    ))
                })?
                .ok_or_else(|| SnapError::Bus("phase completion channel closed".to_string()))?;

            if completion.refresh_job_id != job_id {
                continue;
            }

            if completed.contains(&completion.phase) {
                tracing::debug!(job_id = %job_id, phase = %completion.phase, "ignoring duplicate completion for a phase already marked done");
                continue;
            }

            if completion.success {
                match completion.phase {
                    Phase::Cos => counts.cos = completion.record_count,
                    Phase::Mos => counts.mos = completion.record_count,
                    Phase::Mops => counts.mops = completion.record_count,
                }
                completed.insert(completion.phase);
                job_store::update_record_counts(&self.pool, job_id, counts).await?;

                let outstanding = Phase::ALL.len() - completed.len();
                let elapsed = fanout_started_at.elapsed().as_secs_f64().max(0.001);
                let done_phases = total_phases - outstanding as f64;
                let total_records = (counts.cos + counts.mos + counts.mops) as f64;
                let rate = total_records / elapsed;
                let eta_seconds = if done_phases > 0.0 && outstanding > 0 {
                    Some(((elapsed / done_phases) * outstanding as f64).round() as i64)
                } else {
                    None
                };
                job_store::update_throughput(&self.pool, job_id, rate, eta_seconds).await?;

                self.publish_progress(job_id).await.ok();
                continue;
            }

            let retries = retry_counts.entry(completion.phase).or_insert(0);
            *retries += 1;
            let error = completion.error.unwrap_or_else(|| "phase worker reported failure with no message".to_string());
            job_store::increment_retry(&self.pool, job_id, &error).await?;

            if *retries > max_retries {
                return Err(SnapError::Protocol(format!(
                    "phase {} exhausted its retry budget: {error}",
                    completion.phase
                )));
            }

            let delay = backoff_with_jitter(*retries);
            tracing::warn!(job_id = %job_id, phase = %completion.phase, attempt = retries, delay_ms = delay.as_millis() as u64, "retrying failed phase after backoff");
            tokio::time::sleep(delay).await;
            self.publish_phase_job(job_id, completion.phase, env, &tenant, &access_token)
                .await?;
        }

        // Step 4: finalize — rebuild the unified production-order view now
        // that both MOP and MO tables hold this refresh's rows.
        job_store::set_refresh_status(&self.pool, job_id, RefreshStatus::Finalizing).await?;
        job_store::update_refresh_progress(&self.pool, job_id, "finalizing", 4).await?;
        self.publish_progress(job_id).await.ok();

        production_order_view::rebuild(&self.pool, env).await?;

        // Step 5: run detectors. Non-fatal by design — a detector failure
        // is logged and surfaced, never blocks completion.
        job_store::set_refresh_status(&self.pool, job_id, RefreshStatus::Detecting).await?;
        job_store::update_refresh_progress(&self.pool, job_id, "detecting", 5).await?;
        self.publish_progress(job_id).await.ok();

        if let Err(e) = crate::detectors::run_all(&self.pool, env).await {
            tracing::warn!(job_id = %job_id, error = %e, "detector run reported findings or failed; refresh still completes");
        }

        job_store::complete_refresh_job(&self.pool, job_id).await?;
        audit::record(
            &self.pool,
            "refresh.completed",
            job_id,
            env,
            serde_json::json!({ "mos": counts.mos, "mops": counts.mops, "cos": counts.cos }),
        )
        .await
        .ok();
        self.publish_progress(job_id).await.ok();

        Ok(())
    }

    async fn publish_phase_job(
        &self,
        job_id: Uuid,
        phase: Phase,
        env: EnvTag,
        tenant: &TenantContext,
        access_token: &str,
    ) -> Result<()> {
        let phase_job = PhaseJob {
            refresh_job_id: job_id,
            phase,
            env,
            tenant: tenant.clone(),
            access_token: access_token.to_string(),
        };
        publish_json(self.bus.as_ref(), &subjects::phase_job_subject(phase), &phase_job).await
    }

    async fn publish_progress(&self, job_id: Uuid) -> Result<()> {
        let job = job_store::get_refresh_job(&self.pool, job_id).await?;
        publish_json(
            self.bus.as_ref(),
            &subjects::refresh_progress_subject(job_id),
            &job,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let first = backoff_with_jitter(1);
        let second = backoff_with_jitter(2);
        let far = backoff_with_jitter(20);

        assert!(first >= RETRY_BASE_DELAY);
        assert!(first < RETRY_BASE_DELAY.mul_f64(1.5) + Duration::from_millis(1));
        assert!(second > first);
        assert!(far <= RETRY_MAX_DELAY.mul_f64(1.5) + Duration::from_millis(1));
    }
}
