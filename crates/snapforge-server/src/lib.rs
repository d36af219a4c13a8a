//! Snapforge Server Library
#![recursion_limit = "256"]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_div_ceil)]
#![allow(clippy::redundant_closure)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::useless_format)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::new_without_default)]
#![allow(clippy::impl_trait_in_params)]
#![allow(clippy::unnecessary_lazy_evaluations)]
#![allow(clippy::redundant_field_names)]
#![allow(clippy::needless_borrow)]
#![allow(clippy::manual_clamp)]
#![allow(clippy::map_clone)]
#![allow(clippy::option_map_or_none)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::get_first)]
#![allow(clippy::host_endian_bytes)]
#![allow(clippy::io_other_error)]
#![allow(clippy::type_complexity)]
//!
//! Coordinator, workers, and HTTP surface for the snapshot refresh and
//! bulk operation engine.
//!
//! # Overview
//!
//! - **Message bus** ([`bus`]): in-process pub/sub with queue groups that
//!   the coordinators fan work out over and the progress stream reads from.
//! - **Job store** ([`db::job_store`]): persistence for refresh jobs and
//!   bulk-operation jobs, separate from the snapshot tables themselves.
//! - **Snapshot engine** ([`snapshot`]): the coordinator/worker pair that
//!   runs one environment's MOP/MO/CO refresh end to end.
//! - **Bulk operation engine** ([`bulkop`]): the structurally identical
//!   coordinator/worker pair for issue-driven delete/close/reschedule runs
//!   against the external M3 API.
//! - **Progress stream** ([`progress`]): Server-Sent Events surface over
//!   both job kinds' bus subjects.
//! - **Detectors** ([`detectors`]): non-fatal post-finalize validation
//!   passes.
//!
//! # Framework Stack
//!
//! - **Axum**: web framework and SSE surface
//! - **SQLx**: type-checked SQL against Postgres
//! - **Tower**: middleware and service abstractions
//! - **tokio**: async runtime and channels backing the in-process bus
//!
//! # Example
//!
//! ```no_run
//! use snapforge_server::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     println!("listening on {}:{}", config.server.host, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod bulkop;
pub mod bus;
pub mod config;
pub mod db;
pub mod detectors;
pub mod error;
pub mod features;
pub mod middleware;
pub mod progress;
pub mod snapshot;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
