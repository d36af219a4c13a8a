//! Snapforge Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling, and logging bootstrap used across every
//! crate of the Snapshot Refresh Engine workspace.
//!
//! # Overview
//!
//! - **Error handling**: a single domain error enum and result alias.
//! - **Logging**: a `tracing`-based bootstrap shared by the server and the
//!   worker binaries.
//! - **Types**: the wire/domain types that cross crate boundaries —
//!   `RefreshJob`, `PhaseJob`, `PhaseCompletion`, `BulkOpJob`, and friends.
//!
//! # Example
//!
//! ```no_run
//! use snapforge_common::{Result, SnapError};
//! use snapforge_common::types::EnvTag;
//!
//! fn parse_env(raw: &str) -> Result<EnvTag> {
//!     raw.parse().map_err(|_| SnapError::Config(format!("bad env: {raw}")))
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SnapError};
