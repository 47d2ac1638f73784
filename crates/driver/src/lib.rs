// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Backend-driver adapter.
//!
//! The one component that knows the external storage multiplexer binary
//! (historically `rclone`) exists. It spawns the binary in three modes:
//!
//! - **capture**: run to completion under a deadline, collect output
//! - **streaming**: drain stderr line-by-line through a progress
//!   callback while polling a cancel predicate
//! - **open-stream**: hand back a live stdout reader for file content
//!
//! Everything else in the system programs against the [`DriverApi`]
//! trait; tests use the scripted [`FakeDriver`].

mod api;
mod client;
mod process;

pub use api::{CancelFn, DriverApi, ProgressFn};
pub use client::{Driver, DriverConfig};
pub use process::{CommandResult, DriverStream, EXIT_CANCELLED, EXIT_TIMED_OUT};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DriverCall, FakeDriver};

use thiserror::Error;

/// Errors from driver invocations.
///
/// Cancel and deadline kills in streaming mode are *not* errors; they
/// come back as [`CommandResult`]s with synthetic returncodes.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("unexpected listing output: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Path(#[from] hub_core::PathError),
}
