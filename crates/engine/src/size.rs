// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk-usage scan kind.

use crate::scan::ScanKind;
use hub_core::{Entry, SizeTotals};

/// Counts files and sums their bytes; directories only feed traversal.
/// Negative driver sizes (unknown) count as zero.
#[derive(Debug, Default)]
pub struct SizeScan {
    files_count: u64,
    bytes_total: u64,
}

impl SizeScan {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScanKind for SizeScan {
    type Totals = SizeTotals;

    fn visit(&mut self, entry: &Entry) -> Option<Entry> {
        if !entry.is_dir {
            self.files_count += 1;
            self.bytes_total += entry.size.max(0) as u64;
        }
        None
    }

    fn totals(&self) -> SizeTotals {
        SizeTotals {
            files_count: self.files_count,
            bytes_total: self.bytes_total,
        }
    }
}

#[cfg(test)]
#[path = "size_tests.rs"]
mod tests;
