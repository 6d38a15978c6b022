// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing error display with recovery hints.

use std::fmt;

use crate::client::ClientError;

/// An error message plus what the user can try next
#[derive(Debug)]
pub struct AqError {
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl AqError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Hints for failures the user can act on; None for everything else
    pub fn explain(error: &anyhow::Error) -> Option<Self> {
        let client = error.downcast_ref::<ClientError>()?;
        let err = match client {
            ClientError::DaemonStartFailed(reason) => AqError::new("aqd failed to start")
                .with_context(reason.clone())
                .with_suggestion("Inspect the log: aq daemon logs")
                .with_suggestion("Point at a specific binary with AQ_DAEMON_BINARY"),
            ClientError::DaemonStartTimeout => AqError::new("aqd did not come up in time")
                .with_suggestion("Raise AQ_TIMEOUT_CONNECT_MS")
                .with_suggestion("Inspect the log: aq daemon logs"),
            ClientError::DaemonNotRunning => AqError::new("aqd is not running")
                .with_suggestion("Start it: aq daemon start"),
            ClientError::Protocol(e) => AqError::new(format!("lost contact with aqd: {}", e))
                .with_context("The daemon may have exited or be overloaded")
                .with_suggestion("Check the daemon: aq daemon status"),
            ClientError::Daemon(message) if message.starts_with("queue not found") => {
                AqError::new(message.clone()).with_suggestion("List queues: aq status")
            }
            _ => return None,
        };
        Some(err)
    }
}

impl fmt::Display for AqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for AqError {}
