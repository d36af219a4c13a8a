//! Get a single refresh job by id.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use snapforge_common::types::RefreshJob;
use crate::db::{job_store, DbError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJobQuery {
    pub job_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error("refresh job not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<RefreshJob, GetJobError>> for GetJobQuery {}

pub async fn handle(pool: PgPool, query: GetJobQuery) -> Result<RefreshJob, GetJobError> {
    match job_store::get_refresh_job(&pool, query.job_id).await {
        Ok(job) => Ok(job),
        Err(DbError::NotFound(_)) => Err(GetJobError::NotFound),
        Err(e) => Err(GetJobError::Database(e)),
    }
}
