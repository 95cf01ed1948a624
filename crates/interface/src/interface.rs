// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The server-side face of the remote interface
//!
//! An [`Interface`] wraps an execution engine, an action registry and
//! a job tracker. Jobs are missions started on a client's behalf:
//! starting one instantiates the action, marks the task as a mission
//! and queues its start. After every cycle the interface folds the
//! change journal into job states and fills its outbox with the
//! packets to broadcast: job progress, unhandled exceptions, queued
//! notifications and the cycle-end marker. The server drains the
//! outbox; nothing here touches a socket.

use crate::actions::ActionRegistry;
use crate::errors::InterfaceError;
use crate::jobs::{JobId, JobRecord, JobState, JobTracker};
use crate::packet::{entry, map_get, NotificationLevel, Packet};
use std::collections::BTreeMap;
use weft_core::{Arguments, Clock, ExecState, TaskId};
use weft_droby::{DrobyValue, Marshaller, PeerId, TypeRegistry};
use weft_engine::{CycleReport, ExecutionEngine};

pub struct Interface<C: Clock> {
    engine: ExecutionEngine<C>,
    actions: ActionRegistry,
    jobs: JobTracker,
    marshaller: Marshaller,
    outbox: Vec<Packet>,
}

impl<C: Clock> Interface<C> {
    pub fn new(engine: ExecutionEngine<C>, actions: ActionRegistry) -> Self {
        Self {
            engine,
            actions,
            jobs: JobTracker::new(),
            marshaller: Marshaller::new(PeerId::new(), TypeRegistry::with_builtins()),
            outbox: Vec::new(),
        }
    }

    pub fn engine(&self) -> &ExecutionEngine<C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ExecutionEngine<C> {
        &mut self.engine
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn job(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.job(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.jobs()
    }

    // ---- job operations ------------------------------------------------

    /// Instantiate the action, mark it as a mission and queue its start
    pub fn start_job(
        &mut self,
        action: &str,
        arguments: Arguments,
    ) -> Result<JobId, InterfaceError> {
        let task = self
            .actions
            .instantiate(action, self.engine.plan_mut(), &arguments)?;
        self.engine.plan_mut().mark_mission(task)?;
        self.engine.queue_start(task)?;
        Ok(self.jobs.create(action, task))
    }

    /// Start a job that watches `main` and is dropped with it
    pub fn start_monitoring_job(
        &mut self,
        action: &str,
        arguments: Arguments,
        main: JobId,
    ) -> Result<JobId, InterfaceError> {
        if self.jobs.job(main).is_none() {
            return Err(InterfaceError::UnknownJob(main));
        }
        let monitor = self.start_job(action, arguments)?;
        self.jobs.attach_monitor(monitor, main);
        Ok(monitor)
    }

    /// Stop tracking the job. The task loses its mission status;
    /// garbage collection stops it unless something else needs it.
    pub fn drop_job(&mut self, job: JobId) -> Result<(), InterfaceError> {
        let record = self.jobs.job(job).ok_or(InterfaceError::UnknownJob(job))?;
        let task = record.task;
        if let Err(error) = self.engine.plan_mut().unmark_mission(task) {
            tracing::debug!(%job, %error, "dropped job's task already gone");
        }
        Ok(())
    }

    /// Drop the job and stop its task now rather than waiting for
    /// garbage collection
    pub fn kill_job(&mut self, job: JobId) -> Result<(), InterfaceError> {
        let record = self.jobs.job(job).ok_or(InterfaceError::UnknownJob(job))?;
        let task = record.task;
        if let Err(error) = self.engine.plan_mut().unmark_mission(task) {
            tracing::debug!(%job, %error, "killed job's task already gone");
        }
        let running = self
            .engine
            .plan()
            .task(task)
            .map(|t| t.state == ExecState::Running)
            .unwrap_or(false);
        if running && self.stop_is_controlable(task) {
            // Tasks that cannot be stopped are left to garbage
            // collection, which quarantines them.
            self.engine.queue_stop(task)?;
        }
        Ok(())
    }

    fn stop_is_controlable(&self, task: TaskId) -> bool {
        self.engine
            .plan()
            .bound_event(task, "stop")
            .ok()
            .and_then(|stop| self.engine.plan().event(stop).ok())
            .map(|generator| generator.controlable)
            .unwrap_or(false)
    }

    /// Start the action and run cycles until the job ends
    pub fn run_job(&mut self, action: &str, arguments: Arguments) -> Result<JobId, InterfaceError> {
        let job = self.start_job(action, arguments)?;
        self.wait_job(job)?;
        Ok(job)
    }

    /// Run cycles until the job ends. Fails with
    /// [`InterfaceError::FailedAction`] when the job ends any way but
    /// success, and with [`InterfaceError::FailedBackgroundJob`] when a
    /// monitor of the job fails first.
    pub fn wait_job(&mut self, job: JobId) -> Result<(), InterfaceError> {
        loop {
            let record = self.jobs.job(job).ok_or(InterfaceError::UnknownJob(job))?;
            match record.state {
                JobState::Success => return Ok(()),
                JobState::Queued | JobState::Started => {}
                state => {
                    return Err(InterfaceError::FailedAction {
                        name: record.name.clone(),
                        job,
                        state,
                    });
                }
            }
            if let Some(monitor) = self
                .jobs
                .jobs()
                .find(|r| r.monitoring == Some(job) && r.state == JobState::Failed)
            {
                return Err(InterfaceError::FailedBackgroundJob {
                    job: monitor.id,
                    main: job,
                });
            }
            self.run_cycle()?;
        }
    }

    // ---- notifications -------------------------------------------------

    /// Queue a notification for every connected client
    pub fn notify(&mut self, level: NotificationLevel, message: &str) {
        self.outbox.push(Packet::Notification {
            level,
            message: message.to_string(),
        });
    }

    /// Queue a UI event for every connected client
    pub fn ui_event(&mut self, name: &str, args: Vec<DrobyValue>) {
        self.outbox.push(Packet::UiEvent {
            name: name.to_string(),
            args,
        });
    }

    // ---- the cycle -----------------------------------------------------

    /// One engine cycle, folding its report into job states and the
    /// outbox
    pub fn run_cycle(&mut self) -> Result<CycleReport, InterfaceError> {
        let report = self.engine.run_cycle()?;
        let (updates, released) = self.jobs.apply_changes(self.engine.plan(), &report.changes);
        for task in released {
            if let Err(error) = self.engine.plan_mut().unmark_mission(task) {
                tracing::debug!(%error, "released monitor's task already gone");
            }
        }
        for update in updates {
            self.outbox.push(update.into_packet());
        }
        for exception in &report.exceptions {
            self.outbox.push(Packet::Exception {
                exception: self.marshaller.dump_exception(exception),
            });
        }
        self.outbox.push(Packet::CycleEnd {
            cycle_index: report.cycle_index,
        });
        Ok(report)
    }

    /// Packets queued since the last drain, in order
    pub fn drain_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }

    // ---- call dispatch -------------------------------------------------

    /// Execute one wire call. Errors here answer the call as a
    /// `BadCall`; they never touch the connection.
    pub fn dispatch(
        &mut self,
        method: &str,
        args: &[DrobyValue],
        kwargs: &BTreeMap<String, DrobyValue>,
    ) -> Result<DrobyValue, InterfaceError> {
        match method {
            "start_job" => {
                let name = str_arg(args, 0)?.to_string();
                let arguments = self.load_arguments(kwargs)?;
                let job = self.start_job(&name, arguments)?;
                Ok(job_value(job))
            }
            "start_monitoring_job" => {
                let name = str_arg(args, 0)?.to_string();
                let main = job_arg(args, 1)?;
                let arguments = self.load_arguments(kwargs)?;
                let job = self.start_monitoring_job(&name, arguments, main)?;
                Ok(job_value(job))
            }
            "drop_job" => {
                self.drop_job(job_arg(args, 0)?)?;
                Ok(DrobyValue::Null)
            }
            "kill_job" => {
                self.kill_job(job_arg(args, 0)?)?;
                Ok(DrobyValue::Null)
            }
            "jobs" => Ok(DrobyValue::Array {
                items: self.jobs.jobs().map(job_summary).collect(),
            }),
            "actions" => Ok(DrobyValue::Array {
                items: self
                    .actions
                    .names()
                    .into_iter()
                    .map(|name| DrobyValue::Str {
                        value: name.to_string(),
                    })
                    .collect(),
            }),
            "process_batch" => {
                let DrobyValue::Array { items } = args_at(args, 0)? else {
                    return Err(InterfaceError::BadArguments(
                        "batch entries must be an array".to_string(),
                    ));
                };
                self.dispatch_batch(items)
            }
            other => Err(InterfaceError::UnknownMethod(other.to_string())),
        }
    }

    /// Run every batch entry in order, reporting per-index outcomes
    fn dispatch_batch(&mut self, items: &[DrobyValue]) -> Result<DrobyValue, InterfaceError> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let outcome = self.dispatch_batch_entry(item);
            results.push(match outcome {
                Ok(value) => DrobyValue::Map {
                    entries: vec![
                        entry(
                            "status",
                            DrobyValue::Str {
                                value: "ok".to_string(),
                            },
                        ),
                        entry("value", value),
                    ],
                },
                Err(error) => DrobyValue::Map {
                    entries: vec![
                        entry(
                            "status",
                            DrobyValue::Str {
                                value: "error".to_string(),
                            },
                        ),
                        entry(
                            "message",
                            DrobyValue::Str {
                                value: error.to_string(),
                            },
                        ),
                    ],
                },
            });
        }
        Ok(DrobyValue::Array { items: results })
    }

    fn dispatch_batch_entry(&mut self, item: &DrobyValue) -> Result<DrobyValue, InterfaceError> {
        let DrobyValue::Map { entries } = item else {
            return Err(InterfaceError::BadArguments(
                "batch entry must be a map".to_string(),
            ));
        };
        let Some(DrobyValue::Str { value: method }) = map_get(entries, "method") else {
            return Err(InterfaceError::BadArguments(
                "batch entry has no method".to_string(),
            ));
        };
        if method == "process_batch" {
            return Err(InterfaceError::BadArguments(
                "batches cannot nest".to_string(),
            ));
        }
        let args: Vec<DrobyValue> = match map_get(entries, "args") {
            Some(DrobyValue::Array { items }) => items.clone(),
            Some(_) => {
                return Err(InterfaceError::BadArguments(
                    "batch entry args must be an array".to_string(),
                ));
            }
            None => Vec::new(),
        };
        let kwargs = match map_get(entries, "kwargs") {
            Some(DrobyValue::Map { entries }) => {
                let mut kwargs = BTreeMap::new();
                for (key, value) in entries {
                    let DrobyValue::Str { value: key } = key else {
                        return Err(InterfaceError::BadArguments(
                            "batch entry kwargs keys must be strings".to_string(),
                        ));
                    };
                    kwargs.insert(key.clone(), value.clone());
                }
                kwargs
            }
            Some(_) => {
                return Err(InterfaceError::BadArguments(
                    "batch entry kwargs must be a map".to_string(),
                ));
            }
            None => BTreeMap::new(),
        };
        self.dispatch(method, &args, &kwargs)
    }

    fn load_arguments(
        &self,
        kwargs: &BTreeMap<String, DrobyValue>,
    ) -> Result<Arguments, InterfaceError> {
        let mut arguments = Arguments::new();
        for (key, value) in kwargs {
            arguments.set(key.clone(), self.marshaller.load_value(value)?);
        }
        Ok(arguments)
    }
}

fn job_value(job: JobId) -> DrobyValue {
    DrobyValue::Int {
        value: job.0 as i64,
    }
}

fn job_summary(record: &JobRecord) -> DrobyValue {
    DrobyValue::Map {
        entries: vec![
            entry("id", job_value(record.id)),
            entry(
                "name",
                DrobyValue::Str {
                    value: record.name.clone(),
                },
            ),
            entry(
                "state",
                DrobyValue::Str {
                    value: record.state.as_str().to_string(),
                },
            ),
            entry(
                "task",
                DrobyValue::Int {
                    value: record.task.0 as i64,
                },
            ),
        ],
    }
}

fn args_at(args: &[DrobyValue], index: usize) -> Result<&DrobyValue, InterfaceError> {
    args.get(index)
        .ok_or_else(|| InterfaceError::BadArguments(format!("missing argument {index}")))
}

fn str_arg(args: &[DrobyValue], index: usize) -> Result<&str, InterfaceError> {
    match args_at(args, index)? {
        DrobyValue::Str { value } => Ok(value),
        other => Err(InterfaceError::BadArguments(format!(
            "argument {index} must be a string, got {}",
            other.kind()
        ))),
    }
}

fn job_arg(args: &[DrobyValue], index: usize) -> Result<JobId, InterfaceError> {
    match args_at(args, index)? {
        DrobyValue::Int { value } if *value >= 0 => Ok(JobId(*value as u64)),
        other => Err(InterfaceError::BadArguments(format!(
            "argument {index} must be a job id, got {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
#[path = "interface_tests.rs"]
mod tests;
