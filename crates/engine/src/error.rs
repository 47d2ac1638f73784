// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine.

use hub_driver::DriverError;
use hub_storage::StoreError;
use thiserror::Error;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Path(#[from] hub_core::PathError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scan not found: {0}")]
    ScanNotFound(String),
    #[error("invalid filename query: {0}")]
    InvalidQuery(String),
}
