//! List bulk operation jobs, optionally filtered by status and environment.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use snapforge_common::types::BulkOpJob;
use crate::db::{job_store, DbError};
use crate::features::shared::PaginationParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBulkOpsQuery {
    pub status: Option<String>,
    pub env: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBulkOpsResponse {
    pub jobs: Vec<BulkOpJob>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListBulkOpsError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ListBulkOpsResponse, ListBulkOpsError>> for ListBulkOpsQuery {}

pub async fn handle(
    pool: PgPool,
    query: ListBulkOpsQuery,
) -> Result<ListBulkOpsResponse, ListBulkOpsError> {
    let jobs = job_store::list_bulk_op_jobs(
        &pool,
        query.status.as_deref(),
        query.env.as_deref(),
        query.pagination.per_page(),
        query.pagination.offset(),
    )
    .await?;

    Ok(ListBulkOpsResponse { jobs })
}
