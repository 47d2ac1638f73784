// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess-backed driver client.

use crate::api::{CancelFn, DriverApi, ProgressFn};
use crate::process::{self, CommandResult, DriverStream};
use crate::DriverError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hub_core::{basename, dirname, join, Entry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Flags shared by every copy form.
const COPY_FLAGS: [&str; 1] = ["--create-empty-src-dirs"];

/// Configuration for the driver binary.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Binary name or path, resolved via PATH.
    pub binary: String,
    /// Flags prepended to every invocation.
    pub base_flags: Vec<String>,
    /// Deadline for capture-mode commands.
    pub timeout: Duration,
    /// Extra attempts for commands whose prior attempt exited non-zero.
    pub max_retries: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary: "rclone".to_string(),
            base_flags: Vec::new(),
            timeout: Duration::from_secs(300),
            max_retries: 1,
        }
    }
}

/// The real driver adapter: every method is one subprocess invocation.
#[derive(Clone)]
pub struct Driver {
    config: Arc<DriverConfig>,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Synthesize `[binary] [base_flags…] [args…]`.
    fn command(&self, args: &[&str]) -> Vec<String> {
        let mut cmd = Vec::with_capacity(1 + self.config.base_flags.len() + args.len());
        cmd.push(self.config.binary.clone());
        cmd.extend(self.config.base_flags.iter().cloned());
        cmd.extend(args.iter().map(|a| a.to_string()));
        cmd
    }

    /// Capture-mode run; a zero exit short-circuits the retry loop.
    async fn run_cmd(&self, cmd: Vec<String>) -> Result<CommandResult, DriverError> {
        let mut result = process::run_capture(&cmd, self.config.timeout).await?;
        let mut attempt = 1u32;
        while result.returncode != 0 && attempt <= self.config.max_retries {
            attempt += 1;
            tracing::debug!(
                attempt,
                rc = result.returncode,
                command = %result.command_line(),
                "retrying driver command"
            );
            result = process::run_capture(&cmd, self.config.timeout).await?;
        }
        tracing::debug!(
            rc = result.returncode,
            duration_ms = result.duration_ms,
            command = %result.command_line(),
            "driver exec finished"
        );
        Ok(result)
    }

    async fn run(&self, args: &[&str]) -> Result<CommandResult, DriverError> {
        self.run_cmd(self.command(args)).await
    }

    /// Run and convert a non-zero exit into an error.
    async fn run_checked(&self, args: &[&str]) -> Result<CommandResult, DriverError> {
        let result = self.run(args).await?;
        if !result.success() {
            return Err(DriverError::CommandFailed {
                command: result.command_line(),
                stderr: result.stderr_trimmed().to_string(),
            });
        }
        Ok(result)
    }

    /// One copy invocation; streaming mode when a progress callback is
    /// supplied, quiet capture mode otherwise.
    async fn transfer(
        &self,
        verb: &str,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        match progress {
            Some(callback) => {
                let mut args = vec![verb, source, destination];
                args.extend(COPY_FLAGS);
                args.extend(["--progress", "--stats-one-line"]);
                let cmd = self.command(&args);
                process::run_streaming(&cmd, Some(callback), None, self.config.timeout).await
            }
            None => {
                let mut args = vec![verb, source, destination];
                args.extend(COPY_FLAGS);
                args.push("--progress=false");
                self.run(&args).await
            }
        }
    }
}

/// One item of the driver's JSON listing output.
#[derive(Debug, Deserialize)]
struct ListedItem {
    #[serde(default, rename = "Name")]
    name: String,
    #[serde(default, rename = "Path")]
    path: Option<String>,
    #[serde(default, rename = "IsDir")]
    is_dir: bool,
    #[serde(default, rename = "Size")]
    size: i64,
    #[serde(default, rename = "ModTime")]
    mod_time: Option<String>,
    #[serde(default, rename = "Hashes")]
    hashes: BTreeMap<String, String>,
}

fn parse_mod_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    })
}

/// Map listing JSON into entries rooted at `remote_path`.
fn parse_listing(remote_path: &str, stdout: &str) -> Result<Vec<Entry>, DriverError> {
    let raw = stdout.trim();
    let payload = if raw.is_empty() { "[]" } else { raw };
    let items: Vec<ListedItem> =
        serde_json::from_str(payload).map_err(|e| DriverError::Parse(e.to_string()))?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let relative = item.path.clone().unwrap_or_else(|| item.name.clone());
        entries.push(Entry {
            path: join(remote_path, &relative)?,
            name: item.name,
            parent_path: None,
            is_dir: item.is_dir,
            size: item.size,
            mod_time: parse_mod_time(item.mod_time.as_deref()),
            hashes: item.hashes,
        });
    }
    Ok(entries)
}

/// Parse a single-entry `--stat` listing.
fn parse_stat(remote_path: &str, stdout: &str) -> Result<Entry, DriverError> {
    let raw = stdout.trim();
    let payload = if raw.is_empty() { "{}" } else { raw };
    let item: ListedItem =
        serde_json::from_str(payload).map_err(|e| DriverError::Parse(e.to_string()))?;
    Ok(Entry {
        name: item.name,
        path: remote_path.to_string(),
        parent_path: None,
        is_dir: item.is_dir,
        size: item.size,
        mod_time: parse_mod_time(item.mod_time.as_deref()),
        hashes: item.hashes,
    })
}

/// Files get the single-file delete; directories and unreadable
/// targets get the recursive delete that also prunes emptied dirs.
fn delete_args(remote_path: &str, is_dir: Option<bool>) -> Vec<&str> {
    match is_dir {
        Some(false) => vec!["deletefile", remote_path],
        _ => vec!["delete", remote_path, "--rmdirs"],
    }
}

fn first_nonempty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

fn last_nonempty_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
}

#[async_trait]
impl DriverApi for Driver {
    async fn version(&self) -> Result<String, DriverError> {
        let result = self.run_checked(&["version", "--check=false"]).await?;
        Ok(first_nonempty_line(&result.stdout)
            .unwrap_or("unknown")
            .to_string())
    }

    async fn config_file(&self) -> Result<String, DriverError> {
        let result = self.run_checked(&["config", "file"]).await?;
        Ok(last_nonempty_line(&result.stdout)
            .unwrap_or_default()
            .to_string())
    }

    async fn list_remotes(&self) -> Result<Vec<String>, DriverError> {
        let result = self.run_checked(&["listremotes"]).await?;
        Ok(result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn list(&self, remote_path: &str, recursive: bool) -> Result<Vec<Entry>, DriverError> {
        let mut args = vec![
            "lsjson",
            remote_path,
            "--hash",
            "--metadata",
            "--files-only=false",
        ];
        if recursive {
            args.push("--recursive");
        }
        let result = self.run_checked(&args).await?;
        parse_listing(remote_path, &result.stdout)
    }

    async fn list_cancellable(
        &self,
        remote_path: &str,
        should_cancel: CancelFn,
        timeout: Duration,
    ) -> Result<Vec<Entry>, DriverError> {
        let cmd = self.command(&[
            "lsjson",
            remote_path,
            "--hash",
            "--metadata",
            "--files-only=false",
        ]);
        let result = process::run_streaming(&cmd, None, Some(should_cancel), timeout).await?;
        if !result.success() {
            return Err(DriverError::CommandFailed {
                command: result.command_line(),
                stderr: result.stderr_trimmed().to_string(),
            });
        }
        parse_listing(remote_path, &result.stdout)
    }

    async fn stat(&self, remote_path: &str) -> Result<Entry, DriverError> {
        let result = self
            .run_checked(&["lsjson", remote_path, "--stat", "--hash", "--metadata"])
            .await?;
        parse_stat(remote_path, &result.stdout)
    }

    async fn copy_dir(
        &self,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.transfer("copy", source, destination, progress).await
    }

    async fn copy_file(
        &self,
        source: &str,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.transfer("copyto", source, destination, progress).await
    }

    async fn pull_dir(
        &self,
        source: &str,
        local_dir: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        tokio::fs::create_dir_all(local_dir).await?;
        self.transfer("copy", source, &local_dir.to_string_lossy(), progress)
            .await
    }

    async fn pull_file(
        &self,
        source: &str,
        local_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.transfer("copyto", source, &local_path.to_string_lossy(), progress)
            .await
    }

    async fn push_dir(
        &self,
        local_dir: &Path,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.transfer("copy", &local_dir.to_string_lossy(), destination, progress)
            .await
    }

    async fn push_file(
        &self,
        local_path: &Path,
        destination: &str,
        progress: Option<ProgressFn>,
    ) -> Result<CommandResult, DriverError> {
        self.transfer("copyto", &local_path.to_string_lossy(), destination, progress)
            .await
    }

    async fn delete_path(&self, remote_path: &str) -> Result<CommandResult, DriverError> {
        let is_dir = self.stat(remote_path).await.ok().map(|entry| entry.is_dir);
        self.run(&delete_args(remote_path, is_dir)).await
    }

    async fn rename_within_parent(
        &self,
        remote_path: &str,
        new_name: &str,
    ) -> Result<String, DriverError> {
        if basename(remote_path)? == new_name {
            return Ok(remote_path.to_string());
        }
        let parent = dirname(remote_path)?;
        let target = join(&parent, new_name)?;
        self.run_checked(&["moveto", remote_path, &target]).await?;
        Ok(target)
    }

    async fn open_stream(&self, remote_path: &str) -> Result<DriverStream, DriverError> {
        DriverStream::spawn(&self.command(&["cat", remote_path]))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
