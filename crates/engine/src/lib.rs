// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Transfer engine and background scan sessions.
//!
//! The [`TransferEngine`] owns the durable job queue: submissions land
//! in the store as `queued`, worker loops drain them FIFO through the
//! direct→fallback copy pipeline, and every successful copy is verified
//! before a move deletes its source. [`ScanManager`] runs the pollable
//! search and size walks over the same driver.

mod error;
mod scan;
mod search;
mod size;
mod transfer;
mod verify;

pub use error::EngineError;
pub use scan::{ScanConfig, ScanKind, ScanManager};
pub use search::SearchScan;
pub use size::SizeScan;
pub use transfer::TransferEngine;
pub use verify::{verify_strict, VerifyResult};
