//! snapforge CLI - main entry point

use snapforge_cli::{BulkOpsCommand, Cli, Commands, JobsCommand};
use snapforge_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.command.is_none() {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    }

    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("snapforge-cli".to_string())
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("snapforge-cli".to_string())
            .build()
    };
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> snapforge_cli::Result<()> {
    let Some(ref command) = cli.command else {
        unreachable!("command presence checked in main");
    };

    // SNAPFORGE_SERVER_URL is read by ApiClient::from_env(); --server-url
    // sets it so a flag takes effect even when the env var is unset.
    std::env::set_var("SNAPFORGE_SERVER_URL", &cli.server_url);

    match command {
        Commands::Jobs { command } => match command {
            JobsCommand::List { status, env } => {
                snapforge_cli::commands::jobs::list(status.clone(), env.clone()).await
            }
            JobsCommand::Get { job_id } => {
                let job_id = parse_job_id(job_id)?;
                snapforge_cli::commands::jobs::get(job_id).await
            }
        },

        Commands::BulkOps { command } => match command {
            BulkOpsCommand::List { status, env } => {
                snapforge_cli::commands::bulk_ops::list(status.clone(), env.clone()).await
            }
            BulkOpsCommand::Get { job_id } => {
                let job_id = parse_job_id(job_id)?;
                snapforge_cli::commands::bulk_ops::get(job_id).await
            }
        },

        Commands::Health => {
            let client = snapforge_cli::api::ApiClient::from_env()?;
            if client.health_check().await? {
                println!("snapforge-server is healthy");
                Ok(())
            } else {
                eprintln!("snapforge-server is not responding");
                process::exit(1);
            }
        }
    }
}

fn parse_job_id(raw: &str) -> snapforge_cli::Result<Uuid> {
    raw.parse()
        .map_err(|_| snapforge_cli::CliError::InvalidJobId(raw.to_string()))
}
