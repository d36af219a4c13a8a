//! Read-only HTTP feature slices, organized the way the ingestion
//! framework organizes its API: one directory per resource, each with its
//! own `queries/` and `routes.rs`.
//!
//! Submitting work (starting a refresh, starting a bulk operation) is an
//! external collaborator's concern (§1 non-goals); these routes only ever
//! read what the engine has already persisted.

pub mod bulk_ops;
pub mod jobs;
pub mod shared;

use axum::Router;
use sqlx::PgPool;

/// Shared state for all feature routes: just the database pool, since
/// these routes are read-only.
#[derive(Clone)]
pub struct FeatureState {
    pub db: PgPool,
}

/// Mounts every feature router under its resource prefix.
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(jobs::jobs_routes().with_state(state.db.clone()))
        .merge(bulk_ops::bulk_ops_routes().with_state(state.db))
}
