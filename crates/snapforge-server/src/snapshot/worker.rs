//! Consumes one [`PhaseJob`] at a time from its phase's queue group, drives
//! the warehouse side of the load through [`SnapshotService`], persists the
//! parsed rows, and always emits exactly one [`PhaseCompletion`].
//!
//! Generalizes the ingestion framework's per-source worker loop — pull one
//! unit of work, run it to completion, report back — to a fixed phase
//! instead of an arbitrary ingest source, and to the warehouse's
//! submit/poll/page protocol instead of an FTP/HTTP download.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use snapforge_common::types::{Phase, PhaseCompletion, PhaseJob};
use snapforge_common::Result;

use snapforge_worker::remote_query::{RemoteQueryClient, RemoteQueryClientConfig};
use snapforge_worker::snapshot_service::{PhaseLoadParams, SnapshotService};

use crate::bus::{publish_json, recv_json, subjects, MessageBus};
use crate::db::snapshot_tables;

/// Warehouse connection tunables a Phase Worker needs to build a
/// [`RemoteQueryClient`] per job (the bearer token itself travels with the
/// job, not here, since each refresh carries its own acquired token).
#[derive(Debug, Clone)]
pub struct PhaseWorkerConfig {
    pub base_url: String,
    pub page_size: i64,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
}

/// A single-threaded consumer bound to one phase. Workers MUST NOT process
/// more than one phase job concurrently on the same consumer — that
/// sequencing is what makes the phase-worker queue group's round-robin fan
/// out across distinct workers instead of piling onto whichever drains its
/// mailbox fastest.
pub struct PhaseWorker {
    pool: PgPool,
    bus: Arc<dyn MessageBus>,
    config: PhaseWorkerConfig,
}

impl PhaseWorker {
    pub fn new(pool: PgPool, bus: Arc<dyn MessageBus>, config: PhaseWorkerConfig) -> Self {
        Self { pool, bus, config }
    }

    /// Join `phase`'s queue group and process jobs until the bus closes the
    /// subscription. Run one of these per in-process replica, or embed it in
    /// the standalone `phase-worker` binary for horizontal replicas.
    pub async fn run(&self, phase: Phase) -> Result<()> {
        let mut jobs = self
            .bus
            .queue_subscribe(&subjects::phase_job_subject(phase), &subjects::phase_worker_group(phase))
            .await?;

        while let Some(job) = recv_json::<PhaseJob>(&mut jobs).await {
            if job.phase != phase {
                tracing::warn!(expected = %phase, got = %job.phase, "phase worker received a job for another phase, ignoring");
                continue;
            }
            self.process(job).await;
        }

        Ok(())
    }

    async fn process(&self, job: PhaseJob) {
        let refresh_job_id = job.refresh_job_id;
        let phase = job.phase;

        tracing::info!(job_id = %refresh_job_id, %phase, "phase worker starting job");

        let completion = match self.load_and_persist(&job).await {
            Ok(record_count) => PhaseCompletion {
                refresh_job_id,
                phase,
                success: true,
                record_count,
                error: None,
            },
            Err(e) => {
                tracing::error!(job_id = %refresh_job_id, %phase, error = %e, "phase worker failed");
                PhaseCompletion {
                    refresh_job_id,
                    phase,
                    success: false,
                    record_count: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = publish_json(
            self.bus.as_ref(),
            &subjects::phase_completion_subject(refresh_job_id),
            &completion,
        )
        .await
        {
            tracing::error!(job_id = %refresh_job_id, %phase, error = %e, "failed to publish phase completion");
        }
    }

    async fn load_and_persist(&self, job: &PhaseJob) -> Result<i64> {
        let remote = RemoteQueryClient::new(RemoteQueryClientConfig {
            base_url: self.config.base_url.clone(),
            bearer_token: job.access_token.clone(),
            http_timeout: self.config.http_timeout,
            page_size: self.config.page_size,
            poll_interval: self.config.poll_interval,
        })?;

        let service = SnapshotService::new(remote);
        let params = PhaseLoadParams::full_refresh(job.tenant.clone());
        let env = job.env;
        let pool = &self.pool;

        let total = match job.phase {
            Phase::Mops => {
                service
                    .load_mops(&params, |rows| async move {
                        persist(pool, env, rows).await
                    })
                    .await?
            }
            Phase::Mos => {
                service
                    .load_mos(&params, |rows| async move {
                        persist(pool, env, rows).await
                    })
                    .await?
            }
            Phase::Cos => {
                service
                    .load_cos(&params, |rows| async move {
                        persist(pool, env, rows).await
                    })
                    .await?
            }
        };

        Ok(total)
    }
}

async fn persist(
    pool: &PgPool,
    env: snapforge_common::types::EnvTag,
    rows: Vec<snapforge_common::types::SnapshotRow>,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let natural_key_field = snapforge_worker::snapshot_service::natural_key_field(rows[0].kind);
    snapshot_tables::upsert_snapshot_rows(pool, env, natural_key_field, &rows)
        .await
        .map_err(snapforge_common::SnapError::from)?;
    Ok(())
}
