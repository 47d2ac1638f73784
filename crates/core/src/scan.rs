// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event vocabulary for pollable background scans.
//!
//! Search and size walks share the same event stream shape; they differ
//! only in the counters carried by progress and done events. Every event
//! is tagged with a strictly increasing `seq`, and a terminated session
//! ends with exactly one `done` event.

use crate::entry::Entry;
use serde::{Deserialize, Serialize};

/// Final status carried by a `done` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    Success,
    Cancelled,
    Failed,
}

/// One event in a scan session's stream, generic over the kind-specific
/// counters (`T` is [`SearchTotals`] or [`SizeTotals`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScanEvent<T> {
    Progress {
        seq: u64,
        current_dir: String,
        scanned_dirs: u64,
        #[serde(flatten)]
        totals: T,
    },
    Result {
        seq: u64,
        entry: Entry,
    },
    Done {
        seq: u64,
        status: ScanOutcome,
        scanned_dirs: u64,
        #[serde(flatten)]
        totals: T,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl<T> ScanEvent<T> {
    pub fn seq(&self) -> u64 {
        match self {
            ScanEvent::Progress { seq, .. }
            | ScanEvent::Result { seq, .. }
            | ScanEvent::Done { seq, .. } => *seq,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ScanEvent::Done { .. })
    }
}

/// Counters for a filename search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchTotals {
    pub matched_count: u64,
}

/// Counters for a disk-usage walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeTotals {
    pub files_count: u64,
    pub bytes_total: u64,
}

/// One page of events returned by a poll: everything after the client's
/// cursor, plus the new cursor to poll from next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPage<T> {
    pub events: Vec<ScanEvent<T>>,
    pub done: bool,
    pub next_seq: u64,
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
