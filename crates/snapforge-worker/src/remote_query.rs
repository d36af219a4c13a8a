//! Client for the analytical warehouse's asynchronous SQL-over-HTTP
//! protocol: submit a query, poll until it finishes, then page through its
//! result set.
//!
//! The warehouse never streams a result inline — every query, however
//! small, goes through submit → poll → page. A Phase Worker drives one
//! query per phase per refresh through [`RemoteQueryClient::execute_with_pagination`].

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use snapforge_common::{Result, SnapError};

/// Connection details and tunables for one [`RemoteQueryClient`].
#[derive(Debug, Clone)]
pub struct RemoteQueryClientConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub http_timeout: Duration,
    pub page_size: i64,
    pub poll_interval: Duration,
}

/// Client for the warehouse's submit/poll/page SQL protocol.
#[derive(Clone)]
pub struct RemoteQueryClient {
    http: Client,
    config: RemoteQueryClientConfig,
}

/// `queryId|jobId` tolerance: the warehouse has been observed emitting
/// either field name for the same submission response.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "queryId")]
    query_id: Option<String>,
    #[serde(rename = "jobId")]
    job_id: Option<String>,
}

/// `recordCount|rowCount` tolerance, mirroring `SubmitResponse`.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(rename = "recordCount")]
    record_count: Option<i64>,
    #[serde(rename = "rowCount")]
    row_count: Option<i64>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

impl RemoteQueryClient {
    pub fn new(config: RemoteQueryClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SnapError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Submit `sql` for execution and return the warehouse-assigned query id.
    ///
    /// `max_records = 0` means unbounded; the warehouse computes the full
    /// result regardless of how it will later be paginated.
    pub async fn submit_query(&self, sql: &str, max_records: i64) -> Result<String> {
        let url = format!("{}/jobs/", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.bearer_token)
            .header("Content-Type", "text/plain")
            .query(&[("records", max_records)])
            .body(sql.to_string())
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let response = check_status(response).await?;

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| SnapError::Protocol(format!("malformed submit response: {e}")))?;

        parsed.query_id.or(parsed.job_id).ok_or_else(|| {
            SnapError::Protocol("submit response carried neither queryId nor jobId".to_string())
        })
    }

    /// Poll the warehouse once for a query's current state.
    ///
    /// `wait_hint` is the warehouse's long-poll budget in seconds; it is
    /// mandatory on the wire even when passing 0 (no server-side wait).
    pub async fn poll_status(&self, query_id: &str, wait_hint: i64) -> Result<QueryStatus> {
        let url = format!("{}/jobs/{}/status/", self.config.base_url, query_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.bearer_token)
            .query(&[("timeout", wait_hint)])
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let response = check_status(response).await?;

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| SnapError::Protocol(format!("malformed status response: {e}")))?;

        match parsed.status.as_str() {
            "PENDING" | "RUNNING" => Ok(QueryStatus::Running),
            "FINISHED" | "COMPLETED" => Ok(QueryStatus::Finished {
                record_count: parsed.record_count.or(parsed.row_count).unwrap_or(0),
            }),
            "FAILED" | "ERROR" => Ok(QueryStatus::Failed {
                message: parsed
                    .error_message
                    .unwrap_or_else(|| "warehouse reported failure with no message".to_string()),
            }),
            other => Err(SnapError::Protocol(format!(
                "unknown warehouse query state: {other}"
            ))),
        }
    }

    /// Fetch one page of results, zero-indexed by row offset.
    pub async fn fetch_page(&self, query_id: &str, offset: i64, limit: i64) -> Result<Vec<Value>> {
        let url = format!("{}/jobs/{}/result/", self.config.base_url, query_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.bearer_token)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let response = check_status(response).await?;

        let parsed: Vec<Value> = response
            .json()
            .await
            .map_err(|e| SnapError::Protocol(format!("malformed results page: {e}")))?;

        Ok(parsed)
    }

    /// Best-effort cancellation of an in-flight warehouse job. Failures are
    /// swallowed by the caller's own cancellation path, not here; this just
    /// reports whether the warehouse acknowledged it.
    pub async fn cancel(&self, query_id: &str) -> Result<()> {
        let url = format!("{}/jobs/{}/", self.config.base_url, query_id);

        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.config.bearer_token)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        check_status(response).await?;
        Ok(())
    }

    /// Submit `sql`, poll until it finishes, then page through every
    /// result row, invoking `on_page` once per page of up to
    /// [`RemoteQueryClientConfig::page_size`] rows. Returns the total row
    /// count the warehouse reported.
    ///
    /// Follows the warehouse's exact pagination contract: zero rows short-
    /// circuits with no fetch at all; a result no larger than one page is
    /// fetched in a single call; otherwise the client walks
    /// `ceil(recordCount / pageSize)` pages, clamping the final page's
    /// limit to the remaining row count so it never over-asks.
    ///
    /// Polling and pagination do not retry on their own — a
    /// [`SnapError::TransientWarehouse`] bubbles straight to the caller,
    /// which is expected to be a Phase Worker's own retry loop.
    pub async fn execute_with_pagination<F, Fut>(&self, sql: &str, mut on_page: F) -> Result<i64>
    where
        F: FnMut(Vec<Value>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let query_id = self.submit_query(sql, 0).await?;

        let record_count = loop {
            match self.poll_status(&query_id, 0).await? {
                QueryStatus::Running => {
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                QueryStatus::Finished { record_count } => break record_count,
                QueryStatus::Failed { message } => {
                    return Err(SnapError::WarehouseFailure(message));
                }
            }
        };

        if record_count == 0 {
            return Ok(0);
        }

        let page_size = self.config.page_size.max(1);
        let mut offset = 0i64;
        while offset < record_count {
            let limit = page_size.min(record_count - offset);
            let page = self.fetch_page(&query_id, offset, limit).await?;
            let page_len = page.len() as i64;
            on_page(page).await?;
            offset += limit;
            if page_len == 0 {
                break;
            }
        }

        Ok(record_count)
    }
}

/// Lifecycle of a submitted query, as observed through polling.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
    Running,
    Finished { record_count: i64 },
    Failed { message: String },
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(SnapError::TransientWarehouse(format!(
            "warehouse returned {status}: {body}"
        )));
    }

    Err(SnapError::Protocol(format!(
        "warehouse returned {status}: {body}"
    )))
}

fn map_reqwest_err(e: reqwest::Error) -> SnapError {
    if e.is_timeout() || e.is_connect() {
        SnapError::TransientWarehouse(e.to_string())
    } else {
        SnapError::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RemoteQueryClient {
        RemoteQueryClient::new(RemoteQueryClientConfig {
            base_url: "http://localhost:0".to_string(),
            bearer_token: "test-token".to_string(),
            http_timeout: Duration::from_secs(5),
            page_size: 100,
            poll_interval: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[test]
    fn builds_with_valid_config() {
        let _ = client();
    }

    fn test_client(base_url: String, page_size: i64) -> RemoteQueryClient {
        RemoteQueryClient::new(RemoteQueryClientConfig {
            base_url,
            bearer_token: "test-token".to_string(),
            http_timeout: Duration::from_secs(5),
            page_size,
            poll_interval: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn execute_with_pagination_drives_submit_poll_page_to_completion() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jobs/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"queryId": "q-1"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-1/status/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FINISHED",
                "recordCount": 2,
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-1/result/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"id": 1}, {"id": 2}])),
            )
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 10);

        let mut seen = 0;
        let total = client
            .execute_with_pagination("SELECT 1", |page| {
                seen += page.len();
                async move { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn empty_result_short_circuits_without_fetching_a_page() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jobs/"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(serde_json::json!({"jobId": "q-2"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-2/status/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "COMPLETED",
                "rowCount": 0,
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 10);

        let mut calls = 0;
        let total = client
            .execute_with_pagination("SELECT 1", |page| {
                calls += 1;
                let _ = page;
                async move { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(total, 0);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn last_page_limit_is_clamped_to_remaining_rows() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jobs/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"queryId": "q-3"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-3/status/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FINISHED",
                "recordCount": 7,
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-3/result/"))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(
                (0..5).map(|i| serde_json::json!({"id": i})).collect::<Vec<_>>()
            )))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-3/result/"))
            .and(query_param("offset", "5"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(
                (5..7).map(|i| serde_json::json!({"id": i})).collect::<Vec<_>>()
            )))
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 5);

        let mut seen = 0;
        let total = client
            .execute_with_pagination("SELECT 1", |page| {
                seen += page.len();
                async move { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(total, 7);
        assert_eq!(seen, 7);
    }

    #[tokio::test]
    async fn warehouse_failure_status_yields_warehouse_failure_error() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jobs/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"queryId": "q-4"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-4/status/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ERROR",
                "errorMessage": "syntax error at or near SELEC",
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 10);

        let err = client
            .execute_with_pagination("SELEC 1", |_| async move { Ok(()) })
            .await
            .unwrap_err();

        match err {
            SnapError::WarehouseFailure(msg) => assert!(msg.contains("syntax error")),
            other => panic!("expected WarehouseFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_status_is_reported_as_transient() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jobs/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = test_client(server.uri(), 10);

        let err = client.submit_query("SELECT 1", 0).await.unwrap_err();
        assert!(matches!(err, SnapError::TransientWarehouse(_)));
    }
}
