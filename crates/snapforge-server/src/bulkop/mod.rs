//! The bulk operation engine: resolve issues to production orders, fan
//! execution out over the M3 API with per-environment rate limiting, and
//! expand the results back with primary/duplicate tagging.
//!
//! Structurally the same coordinator/worker split as [`crate::snapshot`],
//! generalized from a fixed three-phase fan-out to an N-batch one sized by
//! the job's execution set.

pub mod coordinator;
pub mod m3_client;
pub mod rate_limiter;
pub mod worker;

pub use coordinator::{BulkOpCoordinator, BulkOpCoordinatorConfig};
pub use m3_client::{M3Client, M3ClientConfig};
pub use rate_limiter::RateLimiter;
pub use worker::BulkOpWorker;
