//! Minimal client for the external M3 API a Bulk Op Worker executes
//! `delete`/`close`/`reschedule` operations against.
//!
//! The M3 call shapes are explicitly out of scope (§1); this is the thin
//! boundary the worker calls through so that scope stays swappable without
//! touching the coordinator or the rate limiter.

use std::time::Duration;

use reqwest::Client;

use snapforge_common::types::BulkOperationType;
use snapforge_common::{Result, SnapError};

#[derive(Debug, Clone)]
pub struct M3ClientConfig {
    pub base_url: String,
    pub api_token: String,
    pub http_timeout: Duration,
}

#[derive(Clone)]
pub struct M3Client {
    http: Client,
    config: M3ClientConfig,
}

impl M3Client {
    pub fn new(config: M3ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SnapError::Config(format!("failed to build M3 HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Execute one operation against one production order. Returns `Ok(())`
    /// on a 2xx response; any other outcome is reported as the order's
    /// failure reason.
    pub async fn execute(
        &self,
        operation: BulkOperationType,
        production_order: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/production-orders/{}/{}",
            self.config.base_url, production_order, operation
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    SnapError::TransientWarehouse(e.to_string())
                } else {
                    SnapError::Protocol(e.to_string())
                }
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SnapError::Protocol(format!(
            "M3 {operation} on {production_order} failed: {status}: {body}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_reports_non_2xx_as_protocol_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let client = M3Client::new(M3ClientConfig {
            base_url: server.uri(),
            api_token: "tok".to_string(),
            http_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = client
            .execute(BulkOperationType::Close, "MO-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapError::Protocol(_)));
    }

    #[tokio::test]
    async fn execute_succeeds_on_2xx() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = M3Client::new(M3ClientConfig {
            base_url: server.uri(),
            api_token: "tok".to_string(),
            http_timeout: Duration::from_secs(5),
        })
        .unwrap();

        client.execute(BulkOperationType::Delete, "MO-1").await.unwrap();
    }
}
