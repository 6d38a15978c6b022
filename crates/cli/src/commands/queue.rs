// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue commands: submit, control, inspect

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use aq_daemon::Request;
use aq_engine::QueueSnapshot;

use crate::client::{ClientError, DaemonClient};
use crate::output::{print, print_list, OutputFormat, QueueView};

pub const DEFAULT_QUEUE: &str = "default";

#[derive(clap::Args)]
pub struct SubmitArgs {
    /// JSON file holding one atom (use - for stdin)
    pub file: PathBuf,
    /// Queue to append to; created on first use
    #[arg(short, long, default_value = DEFAULT_QUEUE)]
    pub queue: String,
    /// Start the queue after submitting
    #[arg(long)]
    pub start: bool,
}

#[derive(clap::Args)]
pub struct QueueArg {
    /// Queue name
    #[arg(default_value = DEFAULT_QUEUE)]
    pub queue: String,
}

#[derive(clap::Args)]
pub struct RemoveArgs {
    /// Id of a pending atom (top-level or nested)
    pub atom_id: String,
    #[arg(short, long, default_value = DEFAULT_QUEUE)]
    pub queue: String,
}

#[derive(clap::Args)]
pub struct ResubmitArgs {
    /// Id of a finished atom
    pub atom_id: String,
    #[arg(short, long, default_value = DEFAULT_QUEUE)]
    pub queue: String,
    /// Start the queue after resubmitting
    #[arg(long)]
    pub start: bool,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Show one queue; all queues when omitted
    pub queue: Option<String>,
}

/// Control operations that answer with a queue snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Pause,
    Resume,
    Abort,
    Terminate,
}

impl Control {
    pub fn request(self, queue: String) -> Request {
        match self {
            Control::Start => Request::Start { queue },
            Control::Pause => Request::Pause { queue },
            Control::Resume => Request::Resume { queue },
            Control::Abort => Request::Abort { queue },
            Control::Terminate => Request::Terminate { queue },
        }
    }
}

fn read_atom(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut json = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut json)
            .context("reading atom from stdin")?;
        return Ok(json);
    }
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

pub async fn submit(client: &DaemonClient, args: SubmitArgs, format: OutputFormat) -> Result<()> {
    let json = read_atom(&args.file)?;
    let result = client.submit(&args.queue, json, args.start).await;
    show(result, format)
}

pub async fn control(
    client: &DaemonClient,
    op: Control,
    queue: String,
    format: OutputFormat,
) -> Result<()> {
    show(client.control(op.request(queue)).await, format)
}

pub async fn remove(client: &DaemonClient, args: RemoveArgs, format: OutputFormat) -> Result<()> {
    match client.remove_atom(&args.queue, &args.atom_id).await {
        Ok((atom, snapshot)) => {
            if matches!(format, OutputFormat::Text) {
                println!("Removed {} ({})", atom.id, atom.name);
            }
            print(&QueueView(snapshot), format);
            Ok(())
        }
        Err(e) => rejected(e),
    }
}

pub async fn resubmit(
    client: &DaemonClient,
    args: ResubmitArgs,
    format: OutputFormat,
) -> Result<()> {
    match client.resubmit(&args.queue, &args.atom_id, args.start).await {
        Ok((atom_id, snapshot)) => {
            if matches!(format, OutputFormat::Text) {
                println!("Resubmitted {} as {}", args.atom_id, atom_id);
            }
            print(&QueueView(snapshot), format);
            Ok(())
        }
        Err(e) => rejected(e),
    }
}

pub async fn status(client: &DaemonClient, args: StatusArgs, format: OutputFormat) -> Result<()> {
    match args.queue {
        Some(queue) => print(&QueueView(client.get_queue(&queue).await?), format),
        None => {
            let queues: Vec<QueueView> = client
                .list_queues()
                .await?
                .into_iter()
                .map(QueueView)
                .collect();
            if queues.is_empty() && matches!(format, OutputFormat::Text) {
                println!("No queues");
            } else {
                print_list(&queues, format);
            }
        }
    }
    Ok(())
}

fn show(result: Result<QueueSnapshot, ClientError>, format: OutputFormat) -> Result<()> {
    match result {
        Ok(snapshot) => {
            print(&QueueView(snapshot), format);
            Ok(())
        }
        Err(e) => rejected(e),
    }
}

/// Report a refused operation along with the queue it was refused on
fn rejected(error: ClientError) -> Result<()> {
    if let ClientError::Rejected {
        message,
        snapshot: Some(snapshot),
    } = error
    {
        eprintln!("{}", QueueView(*snapshot));
        bail!("rejected: {}", message);
    }
    Err(error.into())
}
