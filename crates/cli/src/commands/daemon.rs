// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::client::{daemon_config, daemon_stop, DaemonClient};
use crate::process::read_daemon_pid;

#[derive(clap::Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background (no-op if running)
    Start,
    /// Stop the daemon, aborting running queues
    Stop,
    /// Show whether the daemon is running
    Status,
    /// Print the end of the daemon log
    Logs {
        /// Number of lines
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// `settings` is only read when the daemon has to be started
pub async fn daemon(args: DaemonArgs, settings: Option<PathBuf>) -> Result<()> {
    match args.command {
        DaemonCommand::Start => start(settings).await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Status => status().await,
        DaemonCommand::Logs { lines } => logs(lines),
    }
}

async fn start(settings: Option<PathBuf>) -> Result<()> {
    let client = DaemonClient::connect_or_start(settings.as_deref())?;
    let version = client.hello().await?;
    let pid = read_daemon_pid(&daemon_config()?)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!("Daemon running (pid {}, protocol {})", pid, version);
    Ok(())
}

async fn stop() -> Result<()> {
    if daemon_stop().await? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

async fn status() -> Result<()> {
    let config = daemon_config()?;
    let client = match DaemonClient::connect(&config) {
        Ok(client) => client,
        Err(_) => {
            println!("Daemon not running");
            return Ok(());
        }
    };
    let status = client.status().await?;
    println!("Daemon running");
    println!("  Uptime: {}", format_uptime(status.uptime_secs));
    println!(
        "  Queues: {} ({} running)",
        status.queues, status.queues_running
    );
    println!("  Atom types: {}", status.atom_types.join(", "));
    println!("  Socket: {}", config.socket_path.display());
    println!("  Log: {}", config.log_path.display());
    Ok(())
}

fn logs(lines: usize) -> Result<()> {
    let config = daemon_config()?;
    let content = std::fs::read_to_string(&config.log_path)
        .with_context(|| format!("reading {}", config.log_path.display()))?;
    let all: Vec<&str> = content.lines().collect();
    for line in &all[all.len().saturating_sub(lines)..] {
        println!("{}", line);
    }
    Ok(())
}

fn format_uptime(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}
