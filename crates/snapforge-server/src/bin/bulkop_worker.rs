//! Standalone Bulk Op Worker process.
//!
//! Same deployment shape as [`phase_worker`](crate) — see that binary's
//! doc comment for the in-process bus's cross-process limitation and what
//! swapping [`MessageBus`] buys a real deployment.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use snapforge_common::logging::{init_logging, LogConfig};

use snapforge_server::bulkop::{BulkOpWorker, M3Client, M3ClientConfig, RateLimiter};
use snapforge_server::bus::{InProcessBus, MessageBus};
use snapforge_server::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("bulkop-worker".to_string())
        .filter_directives("snapforge_server=info".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    let config = Config::load()?;
    info!("starting standalone bulk op worker");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new());
    let rate_limiter = Arc::new(RateLimiter::new(config.engine.m3_rate_limit_per_sec));
    let m3 = M3Client::new(M3ClientConfig {
        base_url: config.m3.base_url.clone(),
        api_token: config.m3.api_token.clone(),
        http_timeout: config.warehouse.http_timeout(),
    })?;

    let worker = BulkOpWorker::new(db_pool, bus, rate_limiter, m3);

    info!("bulk op worker joining queue group");
    if let Err(e) = worker.run().await {
        error!(error = %e, "bulk op worker exited");
    }

    Ok(())
}
