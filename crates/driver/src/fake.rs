// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory driver for tests.
//!
//! Listings and stats come from seeded tables; copies and deletes can be
//! scripted to fail a number of times; a per-listing delay makes slow
//! scans reproducible. Every invocation lands in a call log.

use crate::api::{CancelFn, DriverApi, ProgressFn};
use crate::process::{CommandResult, DriverStream};
use crate::DriverError;
use async_trait::async_trait;
use hub_core::{basename, dirname, join, Entry};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A recorded driver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Version,
    ConfigFile,
    ListRemotes,
    List { path: String, recursive: bool },
    ListCancellable { path: String },
    Stat { path: String },
    CopyDir { source: String, destination: String },
    CopyFile { source: String, destination: String },
    PullDir { source: String, local: PathBuf },
    PullFile { source: String, local: PathBuf },
    PushDir { local: PathBuf, destination: String },
    PushFile { local: PathBuf, destination: String },
    Delete { path: String },
    Rename { path: String, new_name: String },
    OpenStream { path: String },
}

#[derive(Default)]
struct FakeState {
    remotes: Vec<String>,
    lists: HashMap<String, Vec<Entry>>,
    stats: HashMap<String, Entry>,
    fail_lists: HashSet<String>,
    streams: HashMap<String, Vec<u8>>,
    direct_copy_failures: u32,
    delete_failures: u32,
    list_delay: Option<Duration>,
    copy_delay: Option<Duration>,
    calls: Vec<DriverCall>,
}

/// In-memory [`DriverApi`] double.
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the configured remotes.
    pub fn set_remotes(&self, remotes: &[&str]) {
        self.state.lock().remotes = remotes.iter().map(|r| r.to_string()).collect();
    }

    /// Seed the listing returned for one path (used by both recursive
    /// and non-recursive listings).
    pub fn insert_listing(&self, path: &str, entries: Vec<Entry>) {
        self.state.lock().lists.insert(path.to_string(), entries);
    }

    /// Seed the stat result for one path.
    pub fn insert_stat(&self, entry: Entry) {
        self.state.lock().stats.insert(entry.path.clone(), entry);
    }

    /// Make listings of `path` fail.
    pub fn fail_listing(&self, path: &str) {
        self.state.lock().fail_lists.insert(path.to_string());
    }

    /// Make the next `n` direct (remote-to-remote) copies exit non-zero.
    pub fn fail_next_direct_copies(&self, n: u32) {
        self.state.lock().direct_copy_failures = n;
    }

    /// Make the next `n` deletes exit non-zero.
    pub fn fail_next_deletes(&self, n: u32) {
        self.state.lock().delete_failures = n;
    }

    /// Delay every cancellable listing, checking the predicate while
    /// waiting (mirrors the real streaming kill).
    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().list_delay = Some(delay);
    }

    /// Delay every copy invocation.
    pub fn set_copy_delay(&self, delay: Duration) {
        self.state.lock().copy_delay = Some(delay);
    }

    /// Seed the bytes served by `open_stream` for one path.
    pub fn insert_stream(&self, path: &str, bytes: Vec<u8>) {
        self.state.lock().streams.insert(path.to_string(), bytes);
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: DriverCall) {
        self.state.lock().calls.push(call);
    }

    fn ok_result(command: &str) -> CommandResult {
        CommandResult {
            args: command.split_whitespace().map(str::to_string).collect(),
            returncode: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            timed_out: false,
        }
    }

    fn failed_result(command: &str, stderr: &str) -> CommandResult {
        CommandResult {
            args: command.split_whitespace().map(str::to_string).collect(),
            returncode: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration_ms: 0,
            timed_out: false,
        }
    }

    async fn copy_outcome(
        &self,
        command: String,
        direct: bool,
        progress: Option<ProgressFn>,
    ) -> CommandResult {
        let delay = self.state.lock().copy_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failed = direct && {
            let mut state = self.state.lock();
            if state.direct_copy_failures > 0 {
                state.direct_copy_failures -= 1;
                true
            } else {
                false
            }
        };
        if failed {
            return Self::failed_result(&command, "copy failed");
        }
        if let Some(callback) = progress {
            callback("Transferred: 1 / 1 Bytes, 100%, 1 B/s, ETA 0s");
        }
        Self::ok_result(&command)
    }
}

#[async_trait]
impl DriverApi for FakeDriver {
    async fn version(&self) -> Result<String, DriverError> {
        self.record(DriverCall::Version);
        Ok("rclone v1.66.0-fake".to_string())
    }

    async fn config_file(&self) -> Result<String, DriverError> {
        self.record(DriverCall::ConfigFile);
        Ok("/home/fake/.config/rclone/rclone.conf".to_string())
    }

    async fn list_remotes(&self) -> Result<Vec<String>, DriverError> {
        self.record(DriverCall::ListRemotes);
        Ok(self.state.lock().remotes.clone())
    }

    async fn list(&self, remote_path: &str, recursive: bool) -> Result<Vec<Entry>, DriverError> {
        self.record(DriverCall::List {
            path: remote_path.to_string(),
            recursive,
        });
        let state = self.state.lock();
        if state.fail_lists.contains(remote_path) {
            return Err(DriverError::CommandFailed {
                command: format!("lsjson {remote_path}"),
                stderr: "listing failed".to_string(),
            });
        }
        Ok(state.lists.get(remote_path).cloned().unwrap_or_default())
    }

    async fn list_cancellable(
        &self,
        remote_path: &str,
        should_cancel: CancelFn,
        _timeout: Duration,
    ) -> Result<Vec<Entry>, DriverError> {
        self.record(DriverCall::ListCancellable {
            path: remote_path.to_string(),
        });
        let delay = self.state.lock().list_delay;
        if let Some(delay) = delay {
            let mut waited = Duration::ZERO;
            let slice = Duration::from_millis(10);
            while waited < delay {
                if should_cancel() {
                    return Err(DriverError::CommandFailed {
                        command: format!("lsjson {remote_path}"),
                        stderr: "Cancelled by user".to_string(),
                    });
                }
                tokio::time::sleep(slice).await;
                waited += slice;
            }
        }
        let state = self.state.lock();
        if state.fail_lists.contains(remote_path) {
            return Err(DriverError::CommandFailed {
                command: format!("lsjson {remote_path}"),
                stderr: "listing failed".to_string(),
            });
        }
        Ok(state.lists.get(remote_path).cloned().unwrap_or_default())
    }

    async fn stat(&self, remote_path: &str) -> Result<Entry, DriverError> {
        self.record(DriverCall::Stat {
            path: remote_path.to_string(),
        });
        self.state
            .lock()
            .stats
            .get(remote_path)
            .cloned()
            .ok_or_else(|| DriverError::CommandFailed {
                command: format!("lsjson {remote_path} --stat"),
                stderr: "object not found".to_string(),
            })
    }

    async fn copy_dir(
        &self,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::CopyDir {
            source: source.to_string(),
            destination: destination.to_string(),
        });
        Ok(self
            .copy_outcome(format!("copy {source} {destination}"), true, progress)
            .await)
    }

    async fn copy_file(
        &self,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::CopyFile {
            source: source.to_string(),
            destination: destination.to_string(),
        });
        Ok(self
            .copy_outcome(format!("copyto {source} {destination}"), true, progress)
            .await)
    }

    async fn pull_dir(
        &self,
        source: &str,
        local_dir: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::PullDir {
            source: source.to_string(),
            local: local_dir.to_path_buf(),
        });
        Ok(self
            .copy_outcome(format!("copy {source} local"), false, progress)
            .await)
    }

    async fn pull_file(
        &self,
        source: &str,
        local_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::PullFile {
            source: source.to_string(),
            local: local_path.to_path_buf(),
        });
        Ok(self
            .copy_outcome(format!("copyto {source} local"), false, progress)
            .await)
    }

    async fn push_dir(
        &self,
        local_dir: &Path,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::PushDir {
            local: local_dir.to_path_buf(),
            destination: destination.to_string(),
        });
        Ok(self
            .copy_outcome(format!("copy local {destination}"), false, progress)
            .await)
    }

    async fn push_file(
        &self,
        local_path: &Path,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::PushFile {
            local: local_path.to_path_buf(),
            destination: destination.to_string(),
        });
        Ok(self
            .copy_outcome(format!("copyto local {destination}"), false, progress)
            .await)
    }

    async fn delete_path(&self, remote_path: &str) -> Result<CommandResult, DriverError> {
        self.record(DriverCall::Delete {
            path: remote_path.to_string(),
        });
        let mut state = self.state.lock();
        if state.delete_failures > 0 {
            state.delete_failures -= 1;
            return Ok(Self::failed_result(
                &format!("delete {remote_path}"),
                "delete failed",
            ));
        }
        // A successful delete makes the path disappear from later stats
        // and listings, like the real backend.
        state.stats.remove(remote_path);
        state.lists.remove(remote_path);
        Ok(Self::ok_result(&format!("delete {remote_path}")))
    }

    async fn rename_within_parent(
        &self,
        remote_path: &str,
        new_name: &str,
    ) -> Result<String, DriverError> {
        self.record(DriverCall::Rename {
            path: remote_path.to_string(),
            new_name: new_name.to_string(),
        });
        if basename(remote_path)? == new_name {
            return Ok(remote_path.to_string());
        }
        Ok(join(&dirname(remote_path)?, new_name)?)
    }

    async fn open_stream(&self, remote_path: &str) -> Result<DriverStream, DriverError> {
        self.record(DriverCall::OpenStream {
            path: remote_path.to_string(),
        });
        let bytes = self
            .state
            .lock()
            .streams
            .get(remote_path)
            .cloned()
            .ok_or_else(|| DriverError::CommandFailed {
                command: format!("cat {remote_path}"),
                stderr: "object not found".to_string(),
            })?;
        Ok(DriverStream::from_bytes(bytes))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
