// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry builders shared by tests across the workspace.

use crate::entry::Entry;
use std::collections::BTreeMap;

/// A file entry with no hashes or modtime.
pub fn file_entry(name: &str, path: &str, size: i64) -> Entry {
    Entry {
        name: name.to_string(),
        path: path.to_string(),
        parent_path: None,
        is_dir: false,
        size,
        mod_time: None,
        hashes: BTreeMap::new(),
    }
}

/// A directory entry.
pub fn dir_entry(name: &str, path: &str) -> Entry {
    Entry {
        name: name.to_string(),
        path: path.to_string(),
        parent_path: None,
        is_dir: true,
        size: -1,
        mod_time: None,
        hashes: BTreeMap::new(),
    }
}

/// A file entry carrying a single md5 digest.
pub fn file_entry_with_md5(name: &str, path: &str, size: i64, md5: &str) -> Entry {
    let mut entry = file_entry(name, path, size);
    entry.hashes.insert("md5".to_string(), md5.to_string());
    entry
}
