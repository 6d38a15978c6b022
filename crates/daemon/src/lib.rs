// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Active Queue daemon (aqd): hosts the queues and serves the control socket

pub mod journal;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use lifecycle::{
    Config, DaemonContext, DaemonState, LifecycleError, Settings, STARTUP_ERROR_PREFIX,
    STARTUP_MARKER_PREFIX,
};
pub use protocol::{DaemonStatus, Query, Request, Response};
