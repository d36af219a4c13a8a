//! Snapforge Worker Library
//!
//! The warehouse-facing half of the snapshot refresh engine: a SQL-over-HTTP
//! client for the analytical warehouse's asynchronous query protocol, and a
//! loose-typing row extractor that turns its JSON results into the domain's
//! `SnapshotRow` shape.
//!
//! # Overview
//!
//! - [`remote_query`]: submit/poll/fetch against the warehouse's
//!   submit-then-poll SQL protocol, with the pagination loop a Phase
//!   Worker drives a query to completion with.
//! - [`snapshot_service`]: turns one page of warehouse rows into typed
//!   `SnapshotRow` values, tolerant of the warehouse's inconsistent
//!   per-column typing.
//!
//! # Example
//!
//! ```no_run
//! use snapforge_worker::remote_query::{RemoteQueryClient, RemoteQueryClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RemoteQueryClient::new(RemoteQueryClientConfig {
//!         base_url: "https://warehouse.example.com".to_string(),
//!         bearer_token: "token".to_string(),
//!         http_timeout: std::time::Duration::from_secs(300),
//!         page_size: 5000,
//!         poll_interval: std::time::Duration::from_secs(2),
//!     })?;
//!     let _ = client;
//!     Ok(())
//! }
//! ```

pub mod remote_query;
pub mod snapshot_service;
