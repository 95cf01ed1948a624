// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling seam
//!
//! The scheduler is consulted once per cycle during the gather phase
//! and may queue start calls for tasks it considers ready. The engine
//! ships with the null scheduler; anything smarter is injected.

use weft_core::{EventId, Plan};

pub trait Scheduler {
    /// Events to call this cycle, with their contexts
    fn ready_events(&mut self, plan: &Plan) -> Vec<(EventId, Vec<serde_json::Value>)>;
}

/// Scheduler that never starts anything on its own
#[derive(Debug, Default)]
pub struct NullScheduler;

impl Scheduler for NullScheduler {
    fn ready_events(&mut self, _plan: &Plan) -> Vec<(EventId, Vec<serde_json::Value>)> {
        Vec::new()
    }
}
