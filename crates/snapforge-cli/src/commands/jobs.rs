//! `snapforge jobs list` / `snapforge jobs get` command implementations.

use colored::Colorize;
use uuid::Uuid;

use snapforge_common::types::{RefreshJob, RefreshStatus};

use crate::api::ApiClient;
use crate::error::Result;

pub async fn list(status: Option<String>, env: Option<String>) -> Result<()> {
    let client = ApiClient::from_env()?;
    let jobs = client.list_jobs(status.as_deref(), env.as_deref()).await?;

    if jobs.is_empty() {
        println!("No refresh jobs found.");
        return Ok(());
    }

    println!("{}", "Refresh Jobs:".cyan().bold());
    println!();
    for job in &jobs {
        print_summary(&job);
    }

    Ok(())
}

pub async fn get(job_id: Uuid) -> Result<()> {
    let client = ApiClient::from_env()?;
    let job = client.get_job(job_id).await?;
    print_detail(&job);
    Ok(())
}

fn print_summary(job: &RefreshJob) {
    println!(
        "{}  {}  {}  {}%  cos={} mos={} mops={}",
        job.id.to_string().dimmed(),
        job.env,
        colored_status(job.status),
        job.completion_percentage(),
        job.counts.cos,
        job.counts.mos,
        job.counts.mops,
    );
}

fn print_detail(job: &RefreshJob) {
    println!("{}", "Refresh Job".cyan().bold());
    println!("  id:             {}", job.id);
    println!("  environment:    {}", job.env);
    println!("  status:         {}", colored_status(job.status));
    println!("  step:           {} ({}/{})", job.current_step, job.completed_steps, job.total_steps);
    println!("  progress:       {}%", job.completion_percentage());
    println!(
        "  counts:         cos={} mos={} mops={}",
        job.counts.cos, job.counts.mos, job.counts.mops
    );
    println!("  throughput:     {:.1} records/sec", job.records_per_sec);
    if let Some(eta) = job.eta_seconds {
        println!("  eta:            {eta}s");
    }
    println!("  retries:        {}/{}", job.retry_count, job.max_retries);
    if let Some(ref error) = job.last_error {
        println!("  last error:     {}", error.red());
    }
    println!("  created:        {}", job.created_at);
    println!("  updated:        {}", job.updated_at);
}

fn colored_status(status: RefreshStatus) -> colored::ColoredString {
    match status {
        RefreshStatus::Completed => status.to_string().green(),
        RefreshStatus::Failed => status.to_string().red(),
        RefreshStatus::Queued => status.to_string().dimmed(),
        _ => status.to_string().yellow(),
    }
}
