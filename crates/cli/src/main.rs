// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! aq - Active Queue CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod error;
mod output;
mod process;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use commands::daemon::{self, DaemonArgs};
use commands::queue::{
    self, Control, QueueArg, RemoveArgs, ResubmitArgs, StatusArgs, SubmitArgs,
};
use commands::watch::{self, HistoryArgs, JournalArgs, WatchArgs};

use crate::client::DaemonClient;
use crate::error::AqError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "aq",
    version,
    about = "Active Queue - ordered, pausable execution of atom trees"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Settings file handed to the daemon if it has to be started
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an atom (JSON) to a queue
    Submit(SubmitArgs),
    /// Start executing a queue
    Start(QueueArg),
    /// Pause a running queue at the next checkpoint
    Pause(QueueArg),
    /// Resume a paused queue
    Resume(QueueArg),
    /// Abort a queue: the running atom stops at its next checkpoint
    Abort(QueueArg),
    /// Terminate a queue: like abort, reported as TERMINATED
    Terminate(QueueArg),
    /// Remove a pending atom from a queue
    Remove(RemoveArgs),
    /// Queue a fresh copy of a finished atom
    Resubmit(ResubmitArgs),
    /// Show queues and their atoms
    Status(StatusArgs),
    /// Stream status changes as they are published
    Watch(WatchArgs),
    /// Journaled status history of one atom
    History(HistoryArgs),
    /// Raw status journal
    Journal(JournalArgs),
    /// Check the daemon responds
    Ping,
    /// Daemon management
    Daemon(DaemonArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match AqError::explain(&e) {
                Some(hinted) => eprint!("{}", hinted),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.format;

    // Commands that don't need a client connection
    let command = match cli.command {
        Commands::Daemon(args) => return daemon::daemon(args, cli.config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "aq", &mut std::io::stdout());
            return Ok(());
        }
        other => other,
    };

    let client = DaemonClient::connect_or_start(cli.config.as_deref())?;

    match command {
        Commands::Submit(args) => queue::submit(&client, args, format).await,
        Commands::Start(arg) => queue::control(&client, Control::Start, arg.queue, format).await,
        Commands::Pause(arg) => queue::control(&client, Control::Pause, arg.queue, format).await,
        Commands::Resume(arg) => queue::control(&client, Control::Resume, arg.queue, format).await,
        Commands::Abort(arg) => queue::control(&client, Control::Abort, arg.queue, format).await,
        Commands::Terminate(arg) => {
            queue::control(&client, Control::Terminate, arg.queue, format).await
        }
        Commands::Remove(args) => queue::remove(&client, args, format).await,
        Commands::Resubmit(args) => queue::resubmit(&client, args, format).await,
        Commands::Status(args) => queue::status(&client, args, format).await,
        Commands::Watch(args) => watch::watch(&client, args, format).await,
        Commands::History(args) => watch::history(&client, args, format).await,
        Commands::Journal(args) => watch::journal(&client, args, format).await,
        Commands::Ping => {
            let elapsed = client.ping().await?;
            println!("pong ({:.1}ms)", elapsed.as_secs_f64() * 1000.0);
            Ok(())
        }
        Commands::Daemon(_) | Commands::Completions { .. } => Ok(()),
    }
}

/// Diagnostics go to stderr, filtered by AQ_LOG (default: warn)
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("AQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
