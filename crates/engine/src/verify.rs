// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strict post-copy verification.

use hub_core::{map_to_destination, Entry};
use hub_driver::DriverApi;
use std::collections::HashMap;

/// Maximum modtime difference accepted when no common checksum exists.
const MODTIME_TOLERANCE_MS: i64 = 2_000;

/// Outcome of a verification pass. Never an error: failures carry a
/// structured reason instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub passed: bool,
    pub reason: String,
}

impl VerifyResult {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: "strict verification passed".to_string(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Compare source and destination listings file-by-file.
///
/// Count, then per-file size, then the intersection of checksum
/// algorithms; files with no common checksum fall back to modtime
/// within two seconds. Directories are not compared because empty-dir
/// presence on the destination is backend-dependent.
pub async fn verify_strict<D: DriverApi>(driver: &D, source: &str, destination: &str) -> VerifyResult {
    let src_entries = match driver.list(source, true).await {
        Ok(entries) => entries,
        Err(e) => return VerifyResult::fail(format!("unable to list for verification: {e}")),
    };
    let dst_entries = match driver.list(destination, true).await {
        Ok(entries) => entries,
        Err(e) => return VerifyResult::fail(format!("unable to list for verification: {e}")),
    };

    let src_files: Vec<&Entry> = src_entries.iter().filter(|e| !e.is_dir).collect();
    let dst_files: Vec<&Entry> = dst_entries.iter().filter(|e| !e.is_dir).collect();

    if src_files.len() != dst_files.len() {
        return VerifyResult::fail("file count mismatch");
    }

    let dst_by_path: HashMap<&str, &Entry> =
        dst_files.iter().map(|e| (e.path.as_str(), *e)).collect();

    for src in &src_files {
        let expected = match map_to_destination(source, &src.path, destination) {
            Ok(path) => path,
            Err(e) => return VerifyResult::fail(format!("invalid path during verification: {e}")),
        };
        let Some(dst) = dst_by_path.get(expected.as_str()) else {
            return VerifyResult::fail(format!("missing destination file: {expected}"));
        };

        if src.size != dst.size {
            return VerifyResult::fail(format!("size mismatch: {}", src.path));
        }

        let common: Vec<&str> = src
            .hashes
            .keys()
            .filter(|alg| dst.hashes.contains_key(*alg))
            .map(String::as_str)
            .collect();
        if !common.is_empty() {
            let mut mismatched: Vec<&str> = common
                .iter()
                .filter(|alg| src.hashes.get(**alg) != dst.hashes.get(**alg))
                .copied()
                .collect();
            if !mismatched.is_empty() {
                mismatched.sort_unstable();
                return VerifyResult::fail(format!(
                    "checksum mismatch ({}): {}",
                    mismatched.join(","),
                    src.path
                ));
            }
        } else if let (Some(src_time), Some(dst_time)) = (src.mod_time, dst.mod_time) {
            let delta_ms = (src_time - dst_time).num_milliseconds().abs();
            if delta_ms > MODTIME_TOLERANCE_MS {
                return VerifyResult::fail(format!(
                    "modtime mismatch without checksum: {}",
                    src.path
                ));
            }
        }
        // No common hash and no modtime on either side: sizes already
        // agreed, accept.
    }

    VerifyResult::pass()
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
