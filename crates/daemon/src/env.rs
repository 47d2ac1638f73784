// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Bind host (`HUB_HOST`, default 127.0.0.1).
pub fn host() -> String {
    std::env::var("HUB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Bind port (`HUB_PORT`, default 8000).
pub fn port() -> u16 {
    std::env::var("HUB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8000)
}

/// Backend driver binary (`DRIVER_BIN`, default rclone), resolved via
/// PATH.
pub fn driver_bin() -> String {
    std::env::var("DRIVER_BIN").unwrap_or_else(|_| "rclone".to_string())
}

/// Capture-mode deadline (`DRIVER_TIMEOUT_SECONDS`, default 300).
pub fn driver_timeout() -> Duration {
    secs_var("DRIVER_TIMEOUT_SECONDS", 300)
}

/// Extra attempts after a non-zero exit (`DRIVER_MAX_RETRIES`,
/// default 1).
pub fn driver_max_retries() -> u32 {
    std::env::var("DRIVER_MAX_RETRIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

/// Extra driver flags (`DRIVER_FLAGS`), shell-tokenized.
pub fn driver_flags() -> Vec<String> {
    std::env::var("DRIVER_FLAGS")
        .ok()
        .and_then(|raw| shlex::split(&raw))
        .unwrap_or_default()
}

/// Search progress heartbeat (`SEARCH_HEARTBEAT_SECONDS`, default 1.0).
pub fn search_heartbeat() -> Duration {
    float_secs_var("SEARCH_HEARTBEAT_SECONDS", 1.0)
}

/// Per-directory search listing deadline (`SEARCH_DIR_TIMEOUT_SECONDS`,
/// default 30).
pub fn search_dir_timeout() -> Duration {
    secs_var("SEARCH_DIR_TIMEOUT_SECONDS", 30)
}

/// Size progress heartbeat (`SIZE_HEARTBEAT_SECONDS`, default 1.0).
pub fn size_heartbeat() -> Duration {
    float_secs_var("SIZE_HEARTBEAT_SECONDS", 1.0)
}

/// Per-directory size listing deadline (`SIZE_DIR_TIMEOUT_SECONDS`,
/// default 30).
pub fn size_dir_timeout() -> Duration {
    secs_var("SIZE_DIR_TIMEOUT_SECONDS", 30)
}

/// Log filter used when `RUST_LOG` is unset (`LOG_LEVEL`, default
/// debug).
pub fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string())
}

/// State directory: `HUB_STATE_DIR` > `~/.rclone-hub`.
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("HUB_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".rclone-hub"))
}

fn secs_var(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

fn float_secs_var(name: &str, default: f64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .unwrap_or(default);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
