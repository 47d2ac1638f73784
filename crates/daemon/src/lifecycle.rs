// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup wiring and shutdown.
//!
//! The composition root: opens the store, builds the driver from the
//! environment, starts the transfer engine (recovery sweep included)
//! and both scan managers, and binds the listener socket. An advisory
//! file lock keeps the queue single-owner across processes.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use hub_driver::{Driver, DriverConfig};
use hub_engine::{EngineError, ScanConfig, ScanManager, TransferEngine};
use hub_storage::{Store, StoreError};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::env;
use crate::listener::ListenCtx;

/// Errors that abort daemon startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no home directory available for state")]
    NoStateDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("another hubd already holds {0}")]
    LockFailed(PathBuf),
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        source: std::io::Error,
    },
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
    pub bind_addr: String,
}

impl Config {
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self {
            db_path: state_dir.join("rclone_hub.db"),
            lock_path: state_dir.join("hubd.lock"),
            bind_addr: format!("{}:{}", env::host(), env::port()),
            state_dir,
        })
    }
}

/// Everything `main` needs after a successful startup.
pub struct StartupResult {
    pub listener: TcpListener,
    pub ctx: Arc<ListenCtx<Driver>>,
    /// Held for the daemon's lifetime; releasing it frees the queue.
    pub lock_file: std::fs::File,
}

pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // A single process owns the queue.
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(config.lock_path.clone()))?;
    let _ = writeln!(lock_file, "{}", std::process::id());

    let store = Arc::new(Store::open(&config.db_path)?);
    let driver = Driver::new(DriverConfig {
        binary: env::driver_bin(),
        base_flags: env::driver_flags(),
        timeout: env::driver_timeout(),
        max_retries: env::driver_max_retries(),
    });

    let engine = TransferEngine::new(Arc::clone(&store), driver.clone());
    // The recovery sweep runs inside start(), before any worker
    // dequeues; submissions only become possible once the listener is
    // up, after this returns.
    engine.start()?;
    info!("transfer engine started");

    let searches = Arc::new(ScanManager::new(
        driver.clone(),
        ScanConfig {
            heartbeat: env::search_heartbeat(),
            per_dir_timeout: env::search_dir_timeout(),
            ..ScanConfig::default()
        },
    ));
    searches.start();
    let sizes = Arc::new(ScanManager::new(
        driver.clone(),
        ScanConfig {
            heartbeat: env::size_heartbeat(),
            per_dir_timeout: env::size_dir_timeout(),
            ..ScanConfig::default()
        },
    ));
    sizes.start();

    let listener =
        TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| LifecycleError::BindFailed {
                addr: config.bind_addr.clone(),
                source,
            })?;

    Ok(StartupResult {
        listener,
        ctx: Arc::new(ListenCtx {
            driver,
            store,
            engine,
            searches,
            sizes,
        }),
        lock_file,
    })
}

/// Graceful shutdown: stop the workers, cancel and join every scan.
pub async fn shutdown(ctx: &ListenCtx<Driver>) {
    ctx.engine.stop();
    ctx.searches.stop().await;
    ctx.sizes.stop().await;
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
