// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use thiserror::Error;
use weft_core::PlanError;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("teardown left {remaining} tasks after {cycles} cycles")]
    TeardownFailed { remaining: usize, cycles: usize },

    #[error("cycle sink failed: {0}")]
    Sink(String),
}
