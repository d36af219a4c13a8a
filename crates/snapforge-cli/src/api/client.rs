//! HTTP client for the snapforge-server read-only job surface.

use reqwest::Client;
use std::time::Duration;
use uuid::Uuid;

use snapforge_common::types::{BulkOpJob, RefreshJob};

use crate::api::{endpoints, types::*};
use crate::error::{CliError, Result};

/// Default timeout for API requests in seconds. Overridable via
/// `SNAPFORGE_API_TIMEOUT_SECS`.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default snapforge-server URL when not specified via environment variable.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Thin HTTP client over snapforge-server's read-only job/bulk-op routes.
/// Request intake (starting a refresh or bulk operation) is an external
/// collaborator's concern, so this client never issues a write.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Result<Self> {
        let timeout_secs = std::env::var("SNAPFORGE_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SNAPFORGE_SERVER_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::new(base_url)
    }

    /// Check server health.
    pub async fn health_check(&self) -> Result<bool> {
        let url = endpoints::health_url(&self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// List refresh jobs, optionally filtered by status and environment.
    pub async fn list_jobs(
        &self,
        status: Option<&str>,
        env: Option<&str>,
    ) -> Result<Vec<RefreshJob>> {
        let url = endpoints::jobs_url(&self.base_url);
        let mut request = self.client.get(&url);
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        if let Some(env) = env {
            request = request.query(&[("env", env)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CliError::api(format!(
                "server returned {} listing refresh jobs",
                response.status()
            )));
        }

        let body: ListJobsResponse = response.json().await?;
        Ok(body.jobs)
    }

    /// Fetch a single refresh job by id.
    pub async fn get_job(&self, job_id: Uuid) -> Result<RefreshJob> {
        let url = endpoints::job_url(&self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CliError::NotFound(format!("refresh job {job_id}")));
        }
        if !response.status().is_success() {
            return Err(CliError::api(format!(
                "server returned {} fetching refresh job {job_id}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// List bulk operation jobs, optionally filtered by status and environment.
    pub async fn list_bulk_ops(
        &self,
        status: Option<&str>,
        env: Option<&str>,
    ) -> Result<Vec<BulkOpJob>> {
        let url = endpoints::bulk_ops_url(&self.base_url);
        let mut request = self.client.get(&url);
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        if let Some(env) = env {
            request = request.query(&[("env", env)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CliError::api(format!(
                "server returned {} listing bulk operation jobs",
                response.status()
            )));
        }

        let body: ListBulkOpsResponse = response.json().await?;
        Ok(body.jobs)
    }

    /// Fetch a single bulk operation job by id.
    pub async fn get_bulk_op(&self, job_id: Uuid) -> Result<BulkOpJob> {
        let url = endpoints::bulk_op_url(&self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CliError::NotFound(format!("bulk operation job {job_id}")));
        }
        if !response.status().is_success() {
            return Err(CliError::api(format!(
                "server returned {} fetching bulk operation job {job_id}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}
