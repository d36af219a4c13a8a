//! Build automation tasks for Snapforge
//!
//! This tool provides various automation tasks for the Snapforge project,
//! including:
//! - Generating CLI documentation from source code
//! - Future build-related tasks

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for Snapforge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate CLI documentation in MDX format
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs/content/en")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    // Generate markdown from clap definitions
    let markdown = clap_markdown::help_markdown::<snapforge_cli::Cli>();

    let mdx_content = format!(
        r#"---
title: CLI Reference
description: Command reference for the Snapforge operator CLI
---

# Snapforge CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`snapforge` is a read-only operator CLI for inspecting snapshot refresh jobs
and bulk operation jobs tracked by the Snapshot Refresh Engine's job store.
It does not trigger refreshes or bulk operations — that intake happens
elsewhere in the system.

## Quick Start

```bash
# List recent refresh jobs for an environment
snapforge jobs list --env PRD

# Get the full status of one refresh job
snapforge jobs get <job-id>

# List bulk operation jobs
snapforge bulk-ops list --env PRD
```

## Commands

{}

## Environment Variables

- `SNAPFORGE_SERVER_URL` - Backend server URL (default: `http://localhost:8000`)
- `RUST_LOG` - Logging level (e.g., `debug`, `info`, `warn`, `error`)

## Support

- GitHub Issues: https://github.com/datadir-lab/snapforge/issues

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.mdx");
    fs::write(&file_path, mdx_content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
