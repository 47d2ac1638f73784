// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote path algebra shared by every component.
//!
//! A remote path has the form `remote:relative/path`: a remote name (no
//! colons) followed by a slash-delimited path. The path part carries no
//! leading slashes in canonical form; an empty path addresses the remote
//! root and renders as `remote:`.

use thiserror::Error;

/// Error for malformed remote paths.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid remote path: {0}")]
    InvalidPath(String),
}

/// Split `remote:path` into the remote name and the path with leading
/// slashes stripped. Fails when no colon is present.
pub fn split(remote_path: &str) -> Result<(&str, &str), PathError> {
    match remote_path.split_once(':') {
        Some((remote, path)) => Ok((remote, path.trim_start_matches('/'))),
        None => Err(PathError::InvalidPath(remote_path.to_string())),
    }
}

/// Join a child segment onto a base remote path, trimming slashes at the
/// seam. An empty child returns the base path unchanged.
pub fn join(base: &str, child: &str) -> Result<String, PathError> {
    let (remote, path) = split(base)?;
    let joined = if path.is_empty() {
        child.trim_matches('/').to_string()
    } else if child.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", path.trim_end_matches('/'), child.trim_matches('/'))
    };
    Ok(format!("{remote}:{joined}"))
}

/// Last slash-delimited segment of the path part; empty for a remote root.
pub fn basename(remote_path: &str) -> Result<String, PathError> {
    let (_, path) = split(remote_path)?;
    let trimmed = path.trim_matches('/');
    Ok(trimmed.rsplit('/').next().unwrap_or_default().to_string())
}

/// Parent of a remote path: `remote:` when the path has zero or one
/// segment, otherwise the remote joined with all but the last segment.
pub fn dirname(remote_path: &str) -> Result<String, PathError> {
    let (remote, path) = split(remote_path)?;
    let trimmed = path.trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) => Ok(format!("{remote}:{parent}")),
        None => Ok(format!("{remote}:")),
    }
}

/// Map a source-rooted item path onto the destination root.
///
/// Strips the source root's path prefix from the item and joins the
/// remainder onto the destination root. This is the bijection the
/// verifier uses to pair source and destination listings.
pub fn map_to_destination(
    source_root: &str,
    item_path: &str,
    destination_root: &str,
) -> Result<String, PathError> {
    let (_, src_prefix) = split(source_root)?;
    let (dst_remote, dst_prefix) = split(destination_root)?;
    let (_, item_rel) = split(item_path)?;

    let rel = if !src_prefix.is_empty() && item_rel.starts_with(src_prefix) {
        item_rel[src_prefix.len()..].trim_start_matches('/')
    } else {
        item_rel.trim_start_matches('/')
    };

    let mapped = if dst_prefix.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        dst_prefix.to_string()
    } else {
        format!("{}/{}", dst_prefix.trim_end_matches('/'), rel)
    };

    Ok(format!("{dst_remote}:{mapped}"))
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
