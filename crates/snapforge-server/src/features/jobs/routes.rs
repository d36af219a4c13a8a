//! Refresh job routes: GET /jobs and GET /jobs/:job_id.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::queries::{
    get_job::{handle as handle_get_job, GetJobError, GetJobQuery},
    list_jobs::{handle as handle_list_jobs, ListJobsQuery},
};

pub fn jobs_routes() -> Router<PgPool> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
}

async fn list_jobs(
    State(db): State<PgPool>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Response, StatusCode> {
    match handle_list_jobs(db, query).await {
        Ok(response) => Ok((StatusCode::OK, Json(json!(response))).into_response()),
        Err(e) => {
            tracing::error!("failed to list refresh jobs: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn get_job(
    State(db): State<PgPool>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    match handle_get_job(db, GetJobQuery { job_id }).await {
        Ok(job) => Ok((StatusCode::OK, Json(json!(job))).into_response()),
        Err(GetJobError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("failed to get refresh job {job_id}: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jobs_routes_build() {
        let _router = jobs_routes();
    }
}
