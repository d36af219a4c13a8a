//! Read-only HTTP access to bulk operation jobs.

pub mod queries;
pub mod routes;

pub use routes::bulk_ops_routes;
