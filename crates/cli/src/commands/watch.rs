// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status commands: live watch and journaled history

use anyhow::Result;

use crate::client::DaemonClient;
use crate::output::{print, print_list, JournalLine, OutputFormat, StatusLine};

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Topic pattern; `*` matches one segment, `**` the rest
    #[arg(default_value = "aq:status:**")]
    pub pattern: String,
    /// Stop after this atom reaches a terminal status
    #[arg(long)]
    pub until: Option<String>,
}

#[derive(clap::Args)]
pub struct HistoryArgs {
    /// Atom id
    pub atom_id: String,
}

#[derive(clap::Args)]
pub struct JournalArgs {
    /// Only records with a higher sequence number
    #[arg(long, default_value = "0")]
    pub after: u64,
    /// Only records whose topic matches this pattern
    #[arg(long)]
    pub topic: Option<String>,
}

pub async fn watch(client: &DaemonClient, args: WatchArgs, format: OutputFormat) -> Result<()> {
    client
        .watch(&args.pattern, |topic, snapshot| {
            let done = args
                .until
                .as_deref()
                .is_some_and(|id| snapshot.id == id && snapshot.status.is_terminal());
            print(
                &StatusLine {
                    topic: Some(topic.to_string()),
                    snapshot: snapshot.clone(),
                },
                format,
            );
            !done
        })
        .await?;
    Ok(())
}

pub async fn history(client: &DaemonClient, args: HistoryArgs, format: OutputFormat) -> Result<()> {
    let snapshots = client.history(&args.atom_id).await?;
    if snapshots.is_empty() && matches!(format, OutputFormat::Text) {
        println!("No history for {}", args.atom_id);
        return Ok(());
    }
    let lines: Vec<StatusLine> = snapshots
        .into_iter()
        .map(|snapshot| StatusLine {
            topic: None,
            snapshot,
        })
        .collect();
    print_list(&lines, format);
    Ok(())
}

pub async fn journal(client: &DaemonClient, args: JournalArgs, format: OutputFormat) -> Result<()> {
    let lines: Vec<JournalLine> = client
        .journal(args.after, args.topic)
        .await?
        .into_iter()
        .map(JournalLine)
        .collect();
    print_list(&lines, format);
    Ok(())
}
