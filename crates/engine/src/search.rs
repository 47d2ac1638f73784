// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filename search scan kind.

use crate::scan::ScanKind;
use crate::EngineError;
use globset::{GlobBuilder, GlobMatcher};
use hub_core::{dirname, Entry, SearchTotals};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Shell-style, case-sensitive filename match with an optional minimum
/// size.
///
/// The size filter applies to files only: directories always pass the
/// gate so they can traverse and still be emitted when their name
/// matches. An empty or whitespace-only query matches everything.
pub struct SearchScan {
    query: String,
    matcher: Option<GlobMatcher>,
    min_size_bytes: Option<i64>,
    matched_count: u64,
}

impl SearchScan {
    /// Build a search kind; `literal` switches to exact name equality.
    pub fn new(
        filename_query: &str,
        literal: bool,
        min_size_mb: Option<f64>,
    ) -> Result<Self, EngineError> {
        let trimmed = filename_query.trim();
        let query = if trimmed.is_empty() { "*" } else { trimmed }.to_string();

        let matcher = if literal {
            None
        } else {
            let glob = GlobBuilder::new(&query)
                .literal_separator(false)
                .build()
                .map_err(|e| EngineError::InvalidQuery(e.to_string()))?;
            Some(glob.compile_matcher())
        };

        Ok(Self {
            query,
            matcher,
            min_size_bytes: min_size_mb.map(|mb| (mb * BYTES_PER_MIB) as i64),
            matched_count: 0,
        })
    }

    fn matches(&self, entry: &Entry) -> bool {
        let name_ok = match &self.matcher {
            Some(matcher) => matcher.is_match(&entry.name),
            None => entry.name == self.query,
        };
        if !name_ok {
            return false;
        }
        match self.min_size_bytes {
            None => true,
            Some(_) if entry.is_dir => true,
            Some(min) => entry.size >= min,
        }
    }
}

impl ScanKind for SearchScan {
    type Totals = SearchTotals;

    fn visit(&mut self, entry: &Entry) -> Option<Entry> {
        if !self.matches(entry) {
            return None;
        }
        let mut hit = entry.clone();
        hit.parent_path = dirname(&entry.path).ok();
        self.matched_count += 1;
        Some(hit)
    }

    fn totals(&self) -> SearchTotals {
        SearchTotals {
            matched_count: self.matched_count,
        }
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
