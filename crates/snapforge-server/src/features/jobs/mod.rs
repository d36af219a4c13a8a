//! Read-only HTTP access to refresh jobs. Submitting a refresh is not an
//! HTTP concern this repository owns (§1 non-goals) — these routes only
//! surface what the job store already persists.

pub mod queries;
pub mod routes;

pub use routes::jobs_routes;
