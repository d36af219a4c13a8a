//! `snapforge bulk-ops list` / `snapforge bulk-ops get` command implementations.

use colored::Colorize;
use uuid::Uuid;

use snapforge_common::types::{BulkOpJob, BulkOpStatus};

use crate::api::ApiClient;
use crate::error::Result;

pub async fn list(status: Option<String>, env: Option<String>) -> Result<()> {
    let client = ApiClient::from_env()?;
    let jobs = client.list_bulk_ops(status.as_deref(), env.as_deref()).await?;

    if jobs.is_empty() {
        println!("No bulk operation jobs found.");
        return Ok(());
    }

    println!("{}", "Bulk Operation Jobs:".cyan().bold());
    println!();
    for job in &jobs {
        print_summary(&job);
    }

    Ok(())
}

pub async fn get(job_id: Uuid) -> Result<()> {
    let client = ApiClient::from_env()?;
    let job = client.get_bulk_op(job_id).await?;
    print_detail(&job);
    Ok(())
}

fn print_summary(job: &BulkOpJob) {
    println!(
        "{}  {}  {}  {}  {}%  batches {}/{}",
        job.id.to_string().dimmed(),
        job.env,
        job.operation,
        colored_status(job.status),
        job.progress_percentage(),
        job.completed_batches,
        job.total_batches,
    );
}

fn print_detail(job: &BulkOpJob) {
    println!("{}", "Bulk Operation Job".cyan().bold());
    println!("  id:             {}", job.id);
    println!("  environment:    {}", job.env);
    println!("  operation:      {}", job.operation);
    println!("  status:         {}", colored_status(job.status));
    println!("  issues:         {}", job.issue_ids.len());
    println!("  batches:        {}/{}", job.completed_batches, job.total_batches);
    println!("  progress:       {}%", job.progress_percentage());
    if let Some(ref error) = job.last_error {
        println!("  last error:     {}", error.red());
    }
    println!("  created:        {}", job.created_at);
    println!("  updated:        {}", job.updated_at);
}

fn colored_status(status: BulkOpStatus) -> colored::ColoredString {
    match status {
        BulkOpStatus::Completed => status.to_string().green(),
        BulkOpStatus::Failed => status.to_string().red(),
        BulkOpStatus::Queued => status.to_string().dimmed(),
        _ => status.to_string().yellow(),
    }
}
