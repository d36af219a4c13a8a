//! Snapshot Refresh Engine server — coordinator process.
//!
//! Hosts the read-only job-status HTTP surface, the SSE progress stream,
//! and (since this deployment collapses the bus to in-process channels per
//! §9) an in-process pool of Phase Workers, Bulk Op Workers, and the
//! dispatcher loops that pick refresh/bulk-op requests off the bus and
//! drive them through a [`SnapshotCoordinator`] / [`BulkOpCoordinator`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};

use snapforge_common::logging::{init_logging, LogConfig};
use snapforge_common::types::{BulkOpRequest, EnvTag, RefreshRequest};

use snapforge_server::bulkop::{
    BulkOpCoordinator, BulkOpCoordinatorConfig, BulkOpWorker, M3Client, M3ClientConfig, RateLimiter,
};
use snapforge_server::bus::{recv_json, subjects, InProcessBus, MessageBus};
use snapforge_server::config::Config;
use snapforge_server::progress::ProgressState;
use snapforge_server::snapshot::coordinator::SnapshotCoordinatorConfig;
use snapforge_server::snapshot::worker::PhaseWorkerConfig;
use snapforge_server::snapshot::{PhaseWorker, SnapshotCoordinator};
use snapforge_server::{features, middleware};

#[derive(Clone)]
struct AppState {
    db: sqlx::PgPool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("snapforge-server".to_string())
        .filter_directives("snapforge_server=info,tower_http=info,axum=info,sqlx=warn".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    info!("starting snapshot refresh engine server");

    let config = Config::load()?;
    info!(host = %config.server.host, port = config.server.port, "configuration loaded");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    info!("database migrations complete");

    let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new());

    spawn_phase_workers(&db_pool, &bus, &config);
    spawn_bulk_op_workers(&db_pool, &bus, &config)?;
    spawn_snapshot_dispatcher(&db_pool, &bus, &config);
    spawn_bulk_op_dispatcher(&db_pool, &bus, &config);

    let state = AppState { db: db_pool };
    let app = create_router(state.clone(), bus, &config);

    let addr: std::net::SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("server shut down gracefully");
    Ok(())
}

/// One replica per `Phase` per configured replica count, matching §5's
/// "pool of Phase Workers (>= 3, typically horizontal replicas)" in the
/// single-node deployment this binary represents.
fn spawn_phase_workers(db_pool: &sqlx::PgPool, bus: &Arc<dyn MessageBus>, config: &Config) {
    let worker_config = PhaseWorkerConfig {
        base_url: config.warehouse.base_url.clone(),
        page_size: config.warehouse.page_size,
        http_timeout: config.warehouse.http_timeout(),
        poll_interval: config.warehouse.poll_interval(),
    };

    for phase in snapforge_common::types::Phase::ALL {
        for replica in 0..config.engine.phase_worker_replicas {
            let worker = PhaseWorker::new(db_pool.clone(), bus.clone(), worker_config.clone());
            tokio::spawn(async move {
                info!(%phase, replica, "phase worker starting");
                if let Err(e) = worker.run(phase).await {
                    error!(%phase, replica, error = %e, "phase worker exited");
                }
            });
        }
    }
}

fn spawn_bulk_op_workers(
    db_pool: &sqlx::PgPool,
    bus: &Arc<dyn MessageBus>,
    config: &Config,
) -> Result<()> {
    let rate_limiter = Arc::new(RateLimiter::new(config.engine.m3_rate_limit_per_sec));

    for replica in 0..config.engine.bulk_op_worker_replicas {
        let m3 = M3Client::new(M3ClientConfig {
            base_url: config.m3.base_url.clone(),
            api_token: config.m3.api_token.clone(),
            http_timeout: config.warehouse.http_timeout(),
        })?;
        let worker = BulkOpWorker::new(db_pool.clone(), bus.clone(), rate_limiter.clone(), m3);
        tokio::spawn(async move {
            info!(replica, "bulk op worker starting");
            if let Err(e) = worker.run().await {
                error!(replica, error = %e, "bulk op worker exited");
            }
        });
    }

    Ok(())
}

/// Picks refresh requests off `snapshot.refresh.{ENV}` (one queue-group
/// subscription per environment tag, since the in-process bus has no
/// wildcard subjects) and drives each through a [`SnapshotCoordinator`] on
/// its own task so a slow refresh never blocks the next request.
fn spawn_snapshot_dispatcher(db_pool: &sqlx::PgPool, bus: &Arc<dyn MessageBus>, config: &Config) {
    let coordinator_config = SnapshotCoordinatorConfig {
        phase_wait_timeout: config.engine.phase_wait_timeout(),
        fanout_stagger: config.engine.fanout_stagger(),
    };

    for env in [EnvTag::Trn, EnvTag::Prd] {
        let db_pool = db_pool.clone();
        let bus = bus.clone();
        let coordinator_config = coordinator_config.clone();

        tokio::spawn(async move {
            let subject = subjects::snapshot_refresh_request_subject(env);
            let mut requests = match bus
                .queue_subscribe(&subject, subjects::SNAPSHOT_COORDINATOR_GROUP)
                .await
            {
                Ok(sub) => sub,
                Err(e) => {
                    error!(%env, error = %e, "failed to subscribe snapshot coordinator to refresh requests");
                    return;
                }
            };

            info!(%env, "snapshot coordinator dispatcher listening");

            while let Some(request) = recv_json::<RefreshRequest>(&mut requests).await {
                let coordinator =
                    SnapshotCoordinator::new(db_pool.clone(), bus.clone(), coordinator_config.clone());
                tokio::spawn(async move {
                    match coordinator
                        .run_refresh(request.env, request.tenant, request.access_token)
                        .await
                    {
                        Ok(job_id) => info!(%job_id, "refresh job finished"),
                        Err(e) => warn!(error = %e, "refresh job failed"),
                    }
                });
            }
        });
    }
}

fn spawn_bulk_op_dispatcher(db_pool: &sqlx::PgPool, bus: &Arc<dyn MessageBus>, config: &Config) {
    let coordinator_config = BulkOpCoordinatorConfig {
        batch_size: config.engine.bulk_op_batch_size,
        batch_wait_timeout: config.engine.bulk_op_timeout(),
    };

    for env in [EnvTag::Trn, EnvTag::Prd] {
        let db_pool = db_pool.clone();
        let bus = bus.clone();
        let coordinator_config = coordinator_config.clone();

        tokio::spawn(async move {
            let subject = subjects::bulk_op_request_subject(env);
            let mut requests = match bus
                .queue_subscribe(&subject, subjects::BULK_OP_COORDINATOR_GROUP)
                .await
            {
                Ok(sub) => sub,
                Err(e) => {
                    error!(%env, error = %e, "failed to subscribe bulk op coordinator to requests");
                    return;
                }
            };

            info!(%env, "bulk op coordinator dispatcher listening");

            while let Some(request) = recv_json::<BulkOpRequest>(&mut requests).await {
                let coordinator =
                    BulkOpCoordinator::new(db_pool.clone(), bus.clone(), coordinator_config.clone());
                tokio::spawn(async move {
                    match coordinator
                        .run_bulk_op(request.env, request.operation, request.issue_ids)
                        .await
                    {
                        Ok(job_id) => info!(%job_id, "bulk operation finished"),
                        Err(e) => warn!(error = %e, "bulk operation failed"),
                    }
                });
            }
        });
    }
}

fn create_router(state: AppState, bus: Arc<dyn MessageBus>, config: &Config) -> Router {
    let feature_state = features::FeatureState { db: state.db.clone() };
    let progress_state = ProgressState { db: state.db.clone(), bus };

    Router::new()
        .route("/health", get(health_check))
        .with_state(state.clone())
        .nest("/api/v1", features::router(feature_state))
        .merge(snapforge_server::progress::router(progress_state))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            error!(error = %e, "database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "disconnected" })),
            )
        }
    }
}

async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("received terminate signal, starting graceful shutdown"),
    }

    info!(timeout_secs, "waiting for connections to close");
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
