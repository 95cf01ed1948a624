// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log message records
//!
//! A logfile frame holds the messages of one cycle: an optional model
//! record before the first task of each model, one record per plan
//! change, one per exception, and a closing cycle-end record. The
//! method string dispatches replay without parsing the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_core::{PlanChange, PlanId};
use weft_droby::{ExceptionDump, ModelDump};
use weft_engine::CycleStats;

pub const METHOD_MODEL: &str = "model";
pub const METHOD_EXCEPTION: &str = "exception";
pub const METHOD_CYCLE_END: &str = "cycle_end";

/// One logged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub method: String,
    pub plan: PlanId,
    pub time: DateTime<Utc>,
    pub args: serde_json::Value,
}

/// Closing record of each cycle frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEndRecord {
    pub cycle_index: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stats: CycleStats,
}

impl LogMessage {
    pub fn change(
        plan: PlanId,
        time: DateTime<Utc>,
        change: &PlanChange,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: change.method().to_string(),
            plan,
            time,
            args: serde_json::to_value(change)?,
        })
    }

    pub fn model(
        plan: PlanId,
        time: DateTime<Utc>,
        dump: &ModelDump,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: METHOD_MODEL.to_string(),
            plan,
            time,
            args: serde_json::to_value(dump)?,
        })
    }

    pub fn exception(
        plan: PlanId,
        time: DateTime<Utc>,
        dump: &ExceptionDump,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: METHOD_EXCEPTION.to_string(),
            plan,
            time,
            args: serde_json::to_value(dump)?,
        })
    }

    pub fn cycle_end(plan: PlanId, record: &CycleEndRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: METHOD_CYCLE_END.to_string(),
            plan,
            time: record.end_time,
            args: serde_json::to_value(record)?,
        })
    }
}
