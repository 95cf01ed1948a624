// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job tracking
//!
//! A job is the client-visible handle on a mission the interface
//! started. The tracker never watches tasks directly: it folds each
//! cycle's change journal into per-job states, so a job moves exactly
//! when the plan records the move. That keeps one progress update per
//! state change, however many events fired in the cycle.

use crate::packet::Packet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use weft_core::{Plan, PlanChange, TaskId};

/// Identifier handed to clients when a job is created
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a tracked job, derived from the plan journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, start queued, not yet running
    Queued,
    Started,
    Success,
    Failed,
    /// Stopped without emitting success or failed
    Finished,
    /// No longer a mission; the task may still be winding down
    Dropped,
    /// The task left the plan
    Finalized,
}

impl JobState {
    /// Whether the job's task reached an end state
    pub fn terminal(self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failed | JobState::Finished | JobState::Finalized
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Started => "started",
            JobState::Success => "success",
            JobState::Failed => "failed",
            JobState::Finished => "finished",
            JobState::Dropped => "dropped",
            JobState::Finalized => "finalized",
        }
    }

    /// Inverse of [`JobState::as_str`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "queued" => Some(JobState::Queued),
            "started" => Some(JobState::Started),
            "success" => Some(JobState::Success),
            "failed" => Some(JobState::Failed),
            "finished" => Some(JobState::Finished),
            "dropped" => Some(JobState::Dropped),
            "finalized" => Some(JobState::Finalized),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the tracker knows about one job
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    /// Action name the job was started from
    pub name: String,
    pub task: TaskId,
    pub state: JobState,
    /// Main job this one monitors, if any
    pub monitoring: Option<JobId>,
}

/// One externally visible state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub job: JobId,
    pub name: String,
    pub state: JobState,
}

impl JobUpdate {
    pub fn into_packet(self) -> Packet {
        Packet::JobProgress {
            job: self.job,
            state: self.state,
            name: self.name,
        }
    }
}

#[derive(Debug, Default)]
pub struct JobTracker {
    next_id: u64,
    jobs: BTreeMap<JobId, JobRecord>,
    by_task: HashMap<TaskId, JobId>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new job. The first id handed out is 1.
    pub fn create(&mut self, name: &str, task: TaskId) -> JobId {
        self.next_id += 1;
        let id = JobId(self.next_id);
        self.jobs.insert(
            id,
            JobRecord {
                id,
                name: name.to_string(),
                task,
                state: JobState::Queued,
                monitoring: None,
            },
        );
        self.by_task.insert(task, id);
        id
    }

    /// Record that `monitor` watches `main`. Returns false when either
    /// job is unknown.
    pub fn attach_monitor(&mut self, monitor: JobId, main: JobId) -> bool {
        if !self.jobs.contains_key(&main) {
            return false;
        }
        match self.jobs.get_mut(&monitor) {
            Some(record) => {
                record.monitoring = Some(main);
                true
            }
            None => false,
        }
    }

    pub fn job(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    pub fn job_for_task(&self, task: TaskId) -> Option<&JobRecord> {
        self.by_task.get(&task).and_then(|id| self.jobs.get(id))
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Fold one cycle's journal into job states. Returns the visible
    /// transitions plus the tasks of monitors released because their
    /// main job ended.
    pub fn apply_changes(
        &mut self,
        plan: &Plan,
        changes: &[PlanChange],
    ) -> (Vec<JobUpdate>, Vec<TaskId>) {
        let mut updates = Vec::new();
        for change in changes {
            match change {
                PlanChange::EventEmitted { event, .. } => {
                    let Ok(generator) = plan.event(*event) else {
                        continue;
                    };
                    let Some(task) = generator.owner_task() else {
                        continue;
                    };
                    let next = match generator.symbol() {
                        Some("start") => JobState::Started,
                        Some("success") => JobState::Success,
                        Some("failed") => JobState::Failed,
                        Some("stop") => JobState::Finished,
                        _ => continue,
                    };
                    self.transition(task, next, &mut updates);
                }
                PlanChange::FailedToStart { task, .. } => {
                    self.transition(*task, JobState::Failed, &mut updates);
                }
                PlanChange::MissionUnmarked { task } => {
                    self.transition(*task, JobState::Dropped, &mut updates);
                }
                PlanChange::FinalizedTask { task } => {
                    self.transition(*task, JobState::Finalized, &mut updates);
                    self.by_task.remove(task);
                }
                _ => {}
            }
        }
        let released = self.release_monitors(&mut updates);
        (updates, released)
    }

    fn transition(&mut self, task: TaskId, next: JobState, updates: &mut Vec<JobUpdate>) {
        let Some(id) = self.by_task.get(&task).copied() else {
            return;
        };
        let Some(record) = self.jobs.get_mut(&id) else {
            return;
        };
        let allowed = match next {
            JobState::Queued => false,
            JobState::Started => record.state == JobState::Queued,
            JobState::Success | JobState::Failed | JobState::Finished | JobState::Dropped => {
                matches!(record.state, JobState::Queued | JobState::Started)
            }
            JobState::Finalized => record.state != JobState::Finalized,
        };
        if !allowed {
            return;
        }
        record.state = next;
        updates.push(JobUpdate {
            job: id,
            name: record.name.clone(),
            state: next,
        });
    }

    /// Drop monitors whose main job ended, returning their tasks so the
    /// caller can release the missions.
    fn release_monitors(&mut self, updates: &mut Vec<JobUpdate>) -> Vec<TaskId> {
        let ended: Vec<JobId> = self
            .jobs
            .values()
            .filter(|record| record.state.terminal() || record.state == JobState::Dropped)
            .map(|record| record.id)
            .collect();
        let mut released = Vec::new();
        for record in self.jobs.values_mut() {
            let watching_ended = record
                .monitoring
                .is_some_and(|main| ended.contains(&main));
            if !watching_ended {
                continue;
            }
            if matches!(record.state, JobState::Queued | JobState::Started) {
                record.state = JobState::Dropped;
                updates.push(JobUpdate {
                    job: record.id,
                    name: record.name.clone(),
                    state: JobState::Dropped,
                });
                released.push(record.task);
            }
        }
        released
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
