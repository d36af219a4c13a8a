//! Bulk operation job routes: GET /bulk-ops and GET /bulk-ops/:job_id.

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
    get_bulk_op::{handle as handle_get_bulk_op, GetBulkOpError, GetBulkOpQuery},
    list_bulk_ops::{handle as handle_list_bulk_ops, ListBulkOpsQuery},
};

pub fn bulk_ops_routes() -> Router<PgPool> {
    Router::new()
        .route("/bulk-ops", get(list_bulk_ops))
        .route("/bulk-ops/:job_id", get(get_bulk_op))
}

async fn list_bulk_ops(
    State(db): State<PgPool>,
    Query(query): Query<ListBulkOpsQuery>,
) -> Result<Response, StatusCode> {
    match handle_list_bulk_ops(db, query).await {
        Ok(response) => Ok((StatusCode::OK, Json(json!(response))).into_response()),
        Err(e) => {
            tracing::error!("failed to list bulk operation jobs: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn get_bulk_op(
    State(db): State<PgPool>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    match handle_get_bulk_op(db, GetBulkOpQuery { job_id }).await {
        Ok(job) => Ok((StatusCode::OK, Json(json!(job))).into_response()),
        Err(GetBulkOpError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("failed to get bulk operation job {job_id}: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bulk_ops_routes_build() {
        let _router = bulk_ops_routes();
    }
}
