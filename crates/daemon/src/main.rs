// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active Queue Daemon (aqd)
//!
//! Owns the named queues and their engine tasks, journals status traffic and
//! answers `aq` over a Unix socket. Usage: `aqd [SETTINGS.toml]`.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use aq_daemon::lifecycle::{
    self, Config, DaemonContext, LifecycleError, STARTUP_ERROR_PREFIX, STARTUP_MARKER_PREFIX,
};
use aq_daemon::server;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Why the accept loop ended
#[derive(Debug, Clone, Copy)]
enum StopReason {
    Sigterm,
    Sigint,
    Requested,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(settings_path.as_deref())?;

    // The CLI scans for the last marker to find this run's startup errors,
    // so it goes in synchronously before the non-blocking writer exists
    append_to_log(
        &config,
        &format!("{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id()),
    )?;
    let log_guard = setup_logging(&config)?;

    info!(
        state_dir = %config.state_dir.display(),
        queues = ?config.settings.queues,
        "starting aqd"
    );

    let mut daemon = match lifecycle::startup(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            let _ = append_to_log(&config, &format!("{STARTUP_ERROR_PREFIX}{e}"));
            error!("startup failed: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    info!(socket = %config.socket_path.display(), "aqd ready");
    // Parent processes wait for this line
    println!("READY");

    let reason = serve(&daemon.listener, Arc::clone(&daemon.ctx)).await?;
    info!(?reason, "shutting down");

    daemon.shutdown().await?;
    info!("aqd stopped");
    Ok(())
}

/// Accept connections until a signal or a `Shutdown` request arrives.
///
/// Every connection gets its own task; queue engines already run on theirs.
async fn serve(listener: &UnixListener, ctx: Arc<DaemonContext>) -> std::io::Result<StopReason> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        if let Err(e) = server::handle_connection(ctx, stream).await {
                            warn!("connection failed: {}", e);
                        }
                    });
                }
                Err(e) => error!("accept failed: {}", e),
            },
            _ = sigterm.recv() => return Ok(StopReason::Sigterm),
            _ = sigint.recv() => return Ok(StopReason::Sigint),
            _ = ctx.shutdown_requested() => return Ok(StopReason::Requested),
        }
    }
}

/// Append one line straight to the log file, bypassing tracing
fn append_to_log(config: &Config, line: &str) -> Result<(), LifecycleError> {
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

fn setup_logging(config: &Config) -> Result<WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config.log_path.parent().ok_or(LifecycleError::NoStateDir)?;
    let file = config
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoStateDir)?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));

    // RUST_LOG wins over the default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(guard)
}
