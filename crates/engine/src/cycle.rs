// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle reports and sinks
//!
//! Each cycle produces one report: the plan changes journalled during
//! the cycle, the exceptions that were raised, and counters. Sinks
//! receive the report at cycle end; the event logger is one sink, the
//! remote interface's notification feed is another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_core::{ExecutionException, Plan, PlanChange};

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Counters for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub calls_processed: usize,
    pub emissions: usize,
    pub exceptions_raised: usize,
    pub garbage_collected: usize,
    pub tasks_in_plan: usize,
}

/// Everything one cycle did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_index: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub changes: Vec<PlanChange>,
    pub exceptions: Vec<ExecutionException>,
    pub stats: CycleStats,
}

/// Receives cycle reports as they are produced
pub trait CycleSink: Send {
    fn cycle_end(&mut self, report: &CycleReport, plan: &Plan) -> Result<(), SinkError>;

    /// Flush and release resources. Called once when the engine shuts
    /// down.
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
