//! API endpoint URL builders for the snapforge-server read-only surface.

use uuid::Uuid;

pub fn health_url(base_url: &str) -> String {
    format!("{base_url}/health")
}

pub fn jobs_url(base_url: &str) -> String {
    format!("{base_url}/api/v1/jobs")
}

pub fn job_url(base_url: &str, job_id: Uuid) -> String {
    format!("{base_url}/api/v1/jobs/{job_id}")
}

pub fn bulk_ops_url(base_url: &str) -> String {
    format!("{base_url}/api/v1/bulk-ops")
}

pub fn bulk_op_url(base_url: &str, job_id: Uuid) -> String {
    format!("{base_url}/api/v1/bulk-ops/{job_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_job_urls() {
        let id = Uuid::nil();
        assert_eq!(jobs_url("http://localhost:8000"), "http://localhost:8000/api/v1/jobs");
        assert_eq!(
            job_url("http://localhost:8000", id),
            format!("http://localhost:8000/api/v1/jobs/{id}")
        );
    }

    #[test]
    fn builds_bulk_op_urls() {
        let id = Uuid::nil();
        assert_eq!(
            bulk_ops_url("http://localhost:8000"),
            "http://localhost:8000/api/v1/bulk-ops"
        );
        assert_eq!(
            bulk_op_url("http://localhost:8000", id),
            format!("http://localhost:8000/api/v1/bulk-ops/{id}")
        );
    }

    #[test]
    fn builds_health_url() {
        assert_eq!(health_url("http://localhost:8000"), "http://localhost:8000/health");
    }
}
