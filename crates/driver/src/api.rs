// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trait surface the rest of the system programs against.

use crate::process::{CommandResult, DriverStream};
use crate::DriverError;
use async_trait::async_trait;
use hub_core::Entry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving raw progress lines from a streaming invocation.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Predicate polled while a child runs; returning true kills it.
pub type CancelFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Operations the orchestrator needs from the backend driver.
///
/// Listing-style operations (`version` through `stat`) convert a
/// non-zero exit into [`DriverError`]. Data-plane operations (copies
/// and deletes) return the raw [`CommandResult`] so callers can route
/// a failed copy into the fallback path instead of aborting.
#[async_trait]
pub trait DriverApi: Clone + Send + Sync + 'static {
    /// First non-empty line of the driver's version output.
    async fn version(&self) -> Result<String, DriverError>;

    /// Last non-empty line of the driver's config-path output.
    async fn config_file(&self) -> Result<String, DriverError>;

    /// Configured remote names, each rendered as `name:`.
    async fn list_remotes(&self) -> Result<Vec<String>, DriverError>;

    /// Directory listing; `recursive` walks the whole subtree.
    async fn list(&self, remote_path: &str, recursive: bool) -> Result<Vec<Entry>, DriverError>;

    /// Non-recursive listing in streaming mode, killed when the cancel
    /// predicate fires or the per-call deadline passes.
    async fn list_cancellable(
        &self,
        remote_path: &str,
        should_cancel: CancelFn,
        timeout: Duration,
    ) -> Result<Vec<Entry>, DriverError>;

    /// Single-entry listing of one remote path.
    async fn stat(&self, remote_path: &str) -> Result<Entry, DriverError>;

    /// Server-to-server directory copy.
    async fn copy_dir(
        &self,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError>;

    /// Server-to-server single-file copy.
    async fn copy_file(
        &self,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError>;

    /// Pull a remote directory into a local staging directory.
    async fn pull_dir(
        &self,
        source: &str,
        local_dir: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError>;

    /// Pull a remote file to a local staging path.
    async fn pull_file(
        &self,
        source: &str,
        local_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError>;

    /// Push a local staging directory to a remote directory.
    async fn push_dir(
        &self,
        local_dir: &Path,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError>;

    /// Push a local staging file to a remote path.
    async fn push_file(
        &self,
        local_path: &Path,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError>;

    /// Delete a file or directory tree, choosing the form by a stat of
    /// the target (directory form when the stat fails).
    async fn delete_path(&self, remote_path: &str) -> Result<CommandResult, DriverError>;

    /// Rename an object within its parent directory. A no-op (returning
    /// the unchanged path) when the basename already matches.
    async fn rename_within_parent(
        &self,
        remote_path: &str,
        new_name: &str,
    ) -> Result<String, DriverError>;

    /// Open a live read stream over a remote file's bytes.
    async fn open_stream(&self, remote_path: &str) -> Result<DriverStream, DriverError>;
}
