// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator settings, persisted as a single record.

use crate::job::VerifyMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default staging byte cap (20 GiB).
pub const DEFAULT_STAGING_CAP_BYTES: u64 = 20 * 1024 * 1024 * 1024;

/// Default number of transfer worker loops.
pub const DEFAULT_CONCURRENCY: u32 = 2;

/// Tunables shared by the transfer engine. Stored field-per-row in the
/// settings table; missing fields fall back to these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Local directory used for fallback byte buffering.
    pub staging_path: PathBuf,
    #[serde(default = "default_staging_cap_bytes")]
    pub staging_cap_bytes: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default)]
    pub verify_mode: VerifyMode,
}

fn default_staging_cap_bytes() -> u64 {
    DEFAULT_STAGING_CAP_BYTES
}

fn default_concurrency() -> u32 {
    DEFAULT_CONCURRENCY
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staging_path: std::env::temp_dir().join("rclone-hub-staging"),
            staging_cap_bytes: DEFAULT_STAGING_CAP_BYTES,
            concurrency: DEFAULT_CONCURRENCY,
            verify_mode: VerifyMode::Strict,
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
