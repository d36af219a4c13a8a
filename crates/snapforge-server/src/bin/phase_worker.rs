//! Standalone Phase Worker process.
//!
//! Joins every phase's queue group and processes jobs until the bus closes.
//! §5 calls for phase workers to be horizontal replicas reachable over a
//! shared bus transport; this binary is the deployable unit that would run
//! against that transport. [`snapforge_server::bus::InProcessBus`] has no
//! cross-process wire protocol, so standalone replicas of this binary only
//! interoperate with each other, not with the in-process pool the
//! `snapforge-server` binary starts — swapping [`MessageBus`] for a NATS- or
//! Redis-streams-backed implementation is what makes this binary useful for
//! real horizontal scale-out, per the trait boundary [`bus`] documents.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use snapforge_common::logging::{init_logging, LogConfig};
use snapforge_common::types::Phase;

use snapforge_server::bus::{InProcessBus, MessageBus};
use snapforge_server::config::Config;
use snapforge_server::snapshot::worker::PhaseWorkerConfig;
use snapforge_server::snapshot::PhaseWorker;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("phase-worker".to_string())
        .filter_directives("snapforge_server=info,snapforge_worker=info".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    let config = Config::load()?;
    info!("starting standalone phase worker");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new());
    let worker_config = PhaseWorkerConfig {
        base_url: config.warehouse.base_url.clone(),
        page_size: config.warehouse.page_size,
        http_timeout: config.warehouse.http_timeout(),
        poll_interval: config.warehouse.poll_interval(),
    };

    let phase = std::env::var("PHASE_WORKER_PHASE")
        .ok()
        .and_then(|p| p.parse::<Phase>().ok());

    let phases: Vec<Phase> = match phase {
        Some(p) => vec![p],
        None => Phase::ALL.to_vec(),
    };

    let mut handles = Vec::new();
    for phase in phases {
        let worker = PhaseWorker::new(db_pool.clone(), bus.clone(), worker_config.clone());
        handles.push(tokio::spawn(async move {
            info!(%phase, "phase worker joining queue group");
            if let Err(e) = worker.run(phase).await {
                error!(%phase, error = %e, "phase worker exited");
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
