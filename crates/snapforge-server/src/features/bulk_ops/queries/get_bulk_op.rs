//! Get a single bulk operation job by id.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use snapforge_common::types::BulkOpJob;
use crate::db::{job_store, DbError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBulkOpQuery {
    pub job_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetBulkOpError {
    #[error("bulk operation job not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<BulkOpJob, GetBulkOpError>> for GetBulkOpQuery {}

pub async fn handle(pool: PgPool, query: GetBulkOpQuery) -> Result<BulkOpJob, GetBulkOpError> {
    match job_store::get_bulk_op_job(&pool, query.job_id).await {
        Ok(job) => Ok(job),
        Err(DbError::NotFound(_)) => Err(GetBulkOpError::NotFound),
        Err(e) => Err(GetBulkOpError::Database(e)),
    }
}
