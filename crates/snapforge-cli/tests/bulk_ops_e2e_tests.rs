//! End-to-end tests for the bulk-operation read routes, stubbed with
//! `wiremock` against the real HTTP client.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snapforge_cli::api::ApiClient;

fn sample_bulk_op_job(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "env": "PRD",
        "operation": "close",
        "issue_ids": [101, 102],
        "status": "running",
        "batch_size": 50,
        "total_batches": 2,
        "completed_batches": 1,
        "last_error": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:01:00Z",
    })
}

#[tokio::test]
async fn list_bulk_ops_returns_parsed_jobs() {
    let server = MockServer::start().await;
    let job_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/api/v1/bulk-ops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jobs": [sample_bulk_op_job(&job_id)]
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let jobs = client.list_bulk_ops(None, None).await.unwrap();

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id.to_string(), job_id);
    assert_eq!(jobs[0].total_batches, 2);
    assert_eq!(jobs[0].progress_percentage(), 20 + 70 / 2);
}

#[tokio::test]
async fn list_bulk_ops_forwards_status_and_env_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/bulk-ops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "jobs": [] })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let jobs = client
        .list_bulk_ops(Some("completed"), Some("PRD"))
        .await
        .unwrap();

    assert!(jobs.is_empty());
}

#[tokio::test]
async fn get_bulk_op_surfaces_not_found() {
    let server = MockServer::start().await;
    let job_id = uuid::Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/bulk-ops/{job_id}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let err = client.get_bulk_op(job_id).await.unwrap_err();

    assert!(matches!(err, snapforge_cli::CliError::NotFound(_)));
}

#[tokio::test]
async fn get_bulk_op_surfaces_server_error() {
    let server = MockServer::start().await;
    let job_id = uuid::Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/bulk-ops/{job_id}")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let err = client.get_bulk_op(job_id).await.unwrap_err();

    assert!(matches!(err, snapforge_cli::CliError::Api(_)));
}
