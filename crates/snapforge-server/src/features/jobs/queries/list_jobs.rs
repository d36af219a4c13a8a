//! List refresh jobs, optionally filtered by status and environment.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use snapforge_common::types::RefreshJob;
use crate::db::{job_store, DbError};
use crate::features::shared::PaginationParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub env: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<RefreshJob>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListJobsError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ListJobsResponse, ListJobsError>> for ListJobsQuery {}

pub async fn handle(pool: PgPool, query: ListJobsQuery) -> Result<ListJobsResponse, ListJobsError> {
    let jobs = job_store::list_refresh_jobs(
        &pool,
        query.status.as_deref(),
        query.env.as_deref(),
        query.pagination.per_page(),
        query.pagination.offset(),
    )
    .await?;

    Ok(ListJobsResponse { jobs })
}
