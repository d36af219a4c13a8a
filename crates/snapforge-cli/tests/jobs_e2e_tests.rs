//! End-to-end tests for the refresh-job and bulk-op read routes the CLI
//! talks to, stubbed with `wiremock` against the real HTTP client.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snapforge_cli::api::ApiClient;

fn sample_refresh_job(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "env": "TRN",
        "status": "running",
        "current_step": "waiting_phases",
        "completed_steps": 3,
        "total_steps": 5,
        "counts": {"cos": 500, "mos": 95, "mops": 121},
        "records_per_sec": 12.5,
        "eta_seconds": 30,
        "retry_count": 0,
        "max_retries": 3,
        "last_error": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:01:00Z",
    })
}

#[tokio::test]
async fn list_jobs_returns_parsed_refresh_jobs() {
    let server = MockServer::start().await;
    let job_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/api/v1/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jobs": [sample_refresh_job(&job_id)]
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let jobs = client.list_jobs(None, None).await.unwrap();

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id.to_string(), job_id);
    assert_eq!(jobs[0].counts.cos, 500);
}

#[tokio::test]
async fn get_job_surfaces_not_found() {
    let server = MockServer::start().await;
    let job_id = uuid::Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/jobs/{job_id}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let err = client.get_job(job_id).await.unwrap_err();

    assert!(matches!(err, snapforge_cli::CliError::NotFound(_)));
}

#[tokio::test]
async fn health_check_reports_false_on_unreachable_server() {
    let client = ApiClient::new("http://127.0.0.1:1".to_string()).unwrap();
    assert!(!client.health_check().await.unwrap());
}
