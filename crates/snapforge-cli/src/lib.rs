//! Snapforge CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Operator command-line interface for read-only inspection of the
//! Snapshot Refresh Engine's job state.
//!
//! # Overview
//!
//! - **Refresh jobs**: `snapforge jobs list` / `snapforge jobs get <id>`
//! - **Bulk operation jobs**: `snapforge bulk-ops list` / `snapforge bulk-ops get <id>`
//!
//! Starting a refresh or bulk operation is an external collaborator's
//! concern (request intake is explicitly out of scope for the engine this
//! CLI talks to); this binary only ever issues reads against
//! `snapforge-server`'s job-status routes.

pub mod api;
pub mod commands;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};

/// snapforge — operator CLI for the Snapshot Refresh Engine
#[derive(Parser, Debug)]
#[command(name = "snapforge")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// snapforge-server base URL
    #[arg(
        long,
        env = "SNAPFORGE_SERVER_URL",
        default_value = "http://localhost:8000",
        global = true
    )]
    pub server_url: String,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect refresh jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },

    /// Inspect bulk operation jobs
    BulkOps {
        #[command(subcommand)]
        command: BulkOpsCommand,
    },

    /// Check snapforge-server health
    Health,
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List refresh jobs
    List {
        /// Filter by status (queued|running|completed|failed)
        #[arg(long)]
        status: Option<String>,
        /// Filter by environment tag (TRN|PRD)
        #[arg(long)]
        env: Option<String>,
    },
    /// Get a single refresh job by id
    Get {
        /// Refresh job id
        job_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum BulkOpsCommand {
    /// List bulk operation jobs
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Filter by environment tag (TRN|PRD)
        #[arg(long)]
        env: Option<String>,
    },
    /// Get a single bulk operation job by id
    Get {
        /// Bulk operation job id
        job_id: String,
    },
}
