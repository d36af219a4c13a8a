//! API response envelopes for the snapforge-server read-only job surface.
//!
//! The job/bulk-op records themselves are the wire types shared with the
//! server (`snapforge_common::types::{RefreshJob, BulkOpJob}`); only the
//! list envelopes are CLI-local since they just mirror the server's
//! `ListJobsResponse`/`ListBulkOpsResponse` shape.

use serde::{Deserialize, Serialize};

use snapforge_common::types::{BulkOpJob, RefreshJob};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<RefreshJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBulkOpsResponse {
    pub jobs: Vec<BulkOpJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_jobs_response_roundtrips() {
        let json = r#"{"jobs":[]}"#;
        let parsed: ListJobsResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.jobs.is_empty());
    }
}
