// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan change journal records
//!
//! Every structural mutation of a plan is journalled as one of these
//! records. The engine drains the journal into its cycle report, the
//! event logger writes the drained records to disk, and a rebuilder
//! replays them with [`crate::Plan::apply`] to maintain a shadow plan.
//! Records are self-contained: applying them needs no access to the
//! plan that produced them.

use crate::arguments::ArgValue;
use crate::ids::{EventId, TaskId};
use crate::relations::{EdgeInfo, EventRelation, TaskRelation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One structural plan mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanChange {
    TaskAdded {
        task: TaskId,
        model: String,
        arguments: BTreeMap<String, ArgValue>,
        /// Generators bound to the task, by symbol
        bound_events: BTreeMap<String, EventId>,
    },
    EventAdded {
        event: EventId,
        controlable: bool,
    },
    MissionMarked {
        task: TaskId,
    },
    MissionUnmarked {
        task: TaskId,
    },
    PermanentTaskMarked {
        task: TaskId,
    },
    PermanentTaskUnmarked {
        task: TaskId,
    },
    PermanentEventMarked {
        event: EventId,
    },
    PermanentEventUnmarked {
        event: EventId,
    },
    ArgumentUpdated {
        task: TaskId,
        key: String,
        value: ArgValue,
    },
    ArgumentFrozen {
        task: TaskId,
        key: String,
    },
    TaskEdgeAdded {
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
        info: EdgeInfo,
    },
    TaskEdgeUpdated {
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
        info: EdgeInfo,
    },
    TaskEdgeRemoved {
        rel: TaskRelation,
        parent: TaskId,
        child: TaskId,
    },
    EventEdgeAdded {
        rel: EventRelation,
        parent: EventId,
        child: EventId,
        info: EdgeInfo,
    },
    EventEdgeUpdated {
        rel: EventRelation,
        parent: EventId,
        child: EventId,
        info: EdgeInfo,
    },
    EventEdgeRemoved {
        rel: EventRelation,
        parent: EventId,
        child: EventId,
    },
    EventEmitted {
        event: EventId,
        context: Vec<serde_json::Value>,
        propagation_id: u64,
        time: DateTime<Utc>,
    },
    EventUnreachable {
        event: EventId,
        reason: Option<String>,
    },
    FailedToStart {
        task: TaskId,
        reason: String,
        time: DateTime<Utc>,
    },
    Quarantined {
        task: TaskId,
        reason: String,
    },
    GarbagedTask {
        task: TaskId,
    },
    GarbagedEvent {
        event: EventId,
    },
    FinalizedTask {
        task: TaskId,
    },
    FinalizedEvent {
        event: EventId,
    },
}

impl PlanChange {
    /// Short method-style name, used by the log layer
    pub fn method(&self) -> &'static str {
        match self {
            PlanChange::TaskAdded { .. } => "task_added",
            PlanChange::EventAdded { .. } => "event_added",
            PlanChange::MissionMarked { .. } => "mission_marked",
            PlanChange::MissionUnmarked { .. } => "mission_unmarked",
            PlanChange::PermanentTaskMarked { .. } => "permanent_task_marked",
            PlanChange::PermanentTaskUnmarked { .. } => "permanent_task_unmarked",
            PlanChange::PermanentEventMarked { .. } => "permanent_event_marked",
            PlanChange::PermanentEventUnmarked { .. } => "permanent_event_unmarked",
            PlanChange::ArgumentUpdated { .. } => "argument_updated",
            PlanChange::ArgumentFrozen { .. } => "argument_frozen",
            PlanChange::TaskEdgeAdded { .. } => "task_edge_added",
            PlanChange::TaskEdgeUpdated { .. } => "task_edge_updated",
            PlanChange::TaskEdgeRemoved { .. } => "task_edge_removed",
            PlanChange::EventEdgeAdded { .. } => "event_edge_added",
            PlanChange::EventEdgeUpdated { .. } => "event_edge_updated",
            PlanChange::EventEdgeRemoved { .. } => "event_edge_removed",
            PlanChange::EventEmitted { .. } => "event_emitted",
            PlanChange::EventUnreachable { .. } => "event_unreachable",
            PlanChange::FailedToStart { .. } => "failed_to_start",
            PlanChange::Quarantined { .. } => "quarantined",
            PlanChange::GarbagedTask { .. } => "garbaged_task",
            PlanChange::GarbagedEvent { .. } => "garbaged_event",
            PlanChange::FinalizedTask { .. } => "finalized_task",
            PlanChange::FinalizedEvent { .. } => "finalized_event",
        }
    }
}
