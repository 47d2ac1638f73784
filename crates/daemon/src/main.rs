// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rclone-hub daemon (hubd)
//!
//! Long-running process that owns the transfer queue and the scan
//! sessions. Clients talk to it over a line-delimited JSON protocol on
//! a local TCP socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod lifecycle;
mod listener;
mod protocol;

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::lifecycle::{Config, LifecycleError, StartupResult};
use crate::listener::Listener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("hubd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("hubd {}", env!("CARGO_PKG_VERSION"));
                println!("rclone-hub daemon - verified transfer orchestrator");
                println!();
                println!("USAGE:");
                println!("    hubd");
                println!();
                println!("Listens on HUB_HOST:HUB_PORT (default 127.0.0.1:8000) for");
                println!("line-delimited JSON requests.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: hubd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();

    let config = Config::load()?;
    info!(state_dir = %config.state_dir.display(), "starting hubd");

    let StartupResult {
        listener,
        ctx,
        lock_file,
    } = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(path)) => {
            let pid = std::fs::read_to_string(&path).unwrap_or_default();
            eprintln!("hubd is already running");
            let pid = pid.trim();
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {e}");
            return Err(e.into());
        }
    };

    let bound = listener.local_addr()?;
    info!(addr = %bound, "daemon ready");

    let listener_task = tokio::spawn(Listener::new(listener, Arc::clone(&ctx)).run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    listener_task.abort();
    lifecycle::shutdown(&ctx).await;
    drop(lock_file);
    info!("daemon stopped");
    Ok(())
}

/// `RUST_LOG` wins; `LOG_LEVEL` provides the default filter.
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env::log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
