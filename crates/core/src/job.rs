// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transfer job records and their lifecycle vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a job does with its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOperation {
    Copy,
    Move,
    Delete,
}

impl std::fmt::Display for JobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOperation::Copy => write!(f, "copy"),
            JobOperation::Move => write!(f, "move"),
            JobOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Lifecycle state of a job or of a single item within it.
///
/// `Interrupted` only arises from the boot recovery sweep, never from a
/// normal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    Interrupted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Interrupted
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Reserved: how a failed direct copy falls back to staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    #[default]
    Auto,
}

/// Reserved: how a completed copy is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    #[default]
    Strict,
}

/// One timestamped log line attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLog {
    pub ts: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Outcome of one source within a job. Appended once the item reaches a
/// terminal per-item state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItemResult {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub direct_attempted: bool,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default)]
    pub verify_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobItemResult {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            status: JobStatus::Running,
            direct_attempted: false,
            fallback_used: false,
            verify_passed: false,
            error: None,
        }
    }
}

/// A copy, move, or delete job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub operation: JobOperation,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_dir: Option<String>,
    #[serde(default)]
    pub fallback_mode: FallbackMode,
    #[serde(default)]
    pub verify_mode: VerifyMode,
    /// One result per source, append-only after item completion.
    #[serde(default)]
    pub results: Vec<JobItemResult>,
    /// Append-only execution log.
    #[serde(default)]
    pub logs: Vec<JobLog>,
}

impl Job {
    /// Create a freshly queued job with a random id.
    pub fn new(
        operation: JobOperation,
        sources: Vec<String>,
        destination_dir: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            sources,
            destination_dir,
            fallback_mode: FallbackMode::Auto,
            verify_mode: VerifyMode::Strict,
            results: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Append a log line stamped with the current time.
    pub fn push_log(&mut self, level: &str, message: impl Into<String>) {
        self.logs.push(JobLog {
            ts: Utc::now(),
            level: level.to_string(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
