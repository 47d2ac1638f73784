// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the hub daemon.
//!
//! Wire format: one JSON request per line, one JSON response per line.
//! A `file_content` request is special: after its header response the
//! raw file bytes are streamed and the connection is closed, so EOF
//! delimits the body.

use hub_core::{Entry, Job, JobOperation, ScanPage, SearchTotals, Settings, SizeTotals};
use serde::{Deserialize, Serialize};

/// Request from a client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Health,
    ListRemotes,
    List {
        remote_path: String,
        #[serde(default)]
        recursive: bool,
    },
    SubmitTransfer {
        operation: JobOperation,
        sources: Vec<String>,
        destination_dir: String,
    },
    SubmitDelete {
        sources: Vec<String>,
    },
    CancelJob {
        job_id: String,
    },
    ListJobs,
    GetJob {
        job_id: String,
    },
    GetSettings,
    PutSettings {
        settings: Settings,
    },
    CreateSearch {
        root_path: String,
        #[serde(default)]
        filename_query: String,
        #[serde(default)]
        literal: bool,
        #[serde(default)]
        min_size_mb: Option<f64>,
    },
    PollSearch {
        search_id: String,
        #[serde(default)]
        after_seq: u64,
    },
    CancelSearch {
        search_id: String,
    },
    CreateSize {
        root_path: String,
    },
    PollSize {
        size_id: String,
        #[serde(default)]
        after_seq: u64,
    },
    CancelSize {
        size_id: String,
    },
    RenamePath {
        source_path: String,
        new_name: String,
    },
    FileContent {
        remote_path: String,
        #[serde(default)]
        disposition: Disposition,
    },
}

/// How a streamed file should be presented by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
}

/// Response from the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Health {
        ok: bool,
        driver_available: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        driver_version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        driver_config_file: Option<String>,
    },
    Remotes {
        remotes: Vec<String>,
    },
    Entries {
        items: Vec<Entry>,
    },
    Job {
        job: Job,
    },
    Jobs {
        jobs: Vec<Job>,
    },
    Settings {
        settings: Settings,
    },
    SearchCreated {
        search_id: String,
    },
    SearchEvents {
        #[serde(flatten)]
        page: ScanPage<SearchTotals>,
    },
    SizeCreated {
        size_id: String,
    },
    SizeEvents {
        #[serde(flatten)]
        page: ScanPage<SizeTotals>,
    },
    Renamed {
        updated_path: String,
    },
    Cancelled {
        ok: bool,
    },
    /// Header for a streamed file body; the raw bytes follow on the
    /// same connection.
    FileHead {
        name: String,
        content_type: String,
        disposition: Disposition,
    },
    Error {
        message: String,
    },
}

/// Preview content type inferred from a filename suffix. Anything not
/// previewable maps to the generic octet stream.
pub fn content_type_for(name: &str) -> &'static str {
    let suffix = name.rsplit('.').next().unwrap_or_default().to_lowercase();
    match suffix.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
