// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution engine
//!
//! One cycle runs in fixed order:
//!
//! 1. finalize the garbage marked last cycle
//! 2. gather: promise completions, scheduler decisions
//! 3. propagate: drain the call queue, then the next emission, until
//!    both queues are empty; everything shares one propagation id
//! 4. exceptions: route each error up the dependency graph; unhandled
//!    ones quarantine their origin task
//! 5. garbage collection: stop or mark unneeded objects
//! 6. cycle end: build the report, feed the sinks, run cycle-end hooks
//!
//! Errors raised by user code during propagation emit the owning
//! task's `internal_error` event within the same cycle, so the default
//! forward chain (internal_error, failed, stop) can end the task
//! before the exception phase sees the error.

use crate::config::EngineConfig;
use crate::cycle::{CycleReport, CycleSink, CycleStats, SinkError};
use crate::errors::EngineError;
use crate::hooks::{
    CommandFn, CycleEndFn, ExceptionHandlerFn, HandlerFn, Hooks, PendingQueues, PropagationHandle,
};
use crate::promises::{PromiseId, PromiseJob, PromisePool};
use crate::scheduler::{NullScheduler, Scheduler};
use std::collections::{BTreeSet, HashMap, VecDeque};
use weft_core::{
    Clock, ErrorKind, EventId, EventRelation, ExecutionException, FailurePoint, LocalizedError,
    Plan, TaskId, TaskRelation,
};

/// Hook run when a promise completes, with the job's result
pub type ContinuationFn =
    Box<dyn FnOnce(&mut PropagationHandle<'_>, Result<serde_json::Value, String>)>;

/// Single-threaded propagation engine over one plan
pub struct ExecutionEngine<C: Clock> {
    plan: Plan,
    clock: C,
    config: EngineConfig,
    hooks: Hooks,
    queues: PendingQueues,
    scheduler: Box<dyn Scheduler>,
    sinks: Vec<Box<dyn CycleSink>>,
    promises: PromisePool,
    continuations: HashMap<PromiseId, ContinuationFn>,
    pending_errors: Vec<LocalizedError>,
    stop_requested: BTreeSet<TaskId>,
    errored_tasks: BTreeSet<TaskId>,
    cycle_index: u64,
    next_propagation_id: u64,
}

impl<C: Clock> ExecutionEngine<C> {
    pub fn new(plan: Plan, clock: C, config: EngineConfig) -> Self {
        let promises = PromisePool::new(config.promise_workers);
        Self {
            plan,
            clock,
            config,
            hooks: Hooks::default(),
            queues: PendingQueues::default(),
            scheduler: Box::new(NullScheduler),
            sinks: Vec::new(),
            promises,
            continuations: HashMap::new(),
            pending_errors: Vec::new(),
            stop_requested: BTreeSet::new(),
            errored_tasks: BTreeSet::new(),
            cycle_index: 0,
            next_propagation_id: 1,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Direct plan access between cycles. The remote interface uses
    /// this to apply edits; never call it from inside a hook.
    pub fn plan_mut(&mut self) -> &mut Plan {
        &mut self.plan
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cycle_index(&self) -> u64 {
        self.cycle_index
    }

    pub fn set_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        self.scheduler = scheduler;
    }

    pub fn add_sink(&mut self, sink: Box<dyn CycleSink>) {
        self.sinks.push(sink);
    }

    // ---- hooks ---------------------------------------------------------

    /// Attach the command run when the generator is called. One command
    /// per generator; a later registration replaces the earlier one.
    pub fn on_command(&mut self, event: EventId, command: CommandFn) {
        self.hooks.commands.insert(event, command);
    }

    /// Attach a handler run after the generator emits
    pub fn on_emission(&mut self, event: EventId, handler: HandlerFn) {
        self.hooks.handlers.entry(event).or_default().push(handler);
    }

    /// Attach an exception handler to a task
    pub fn on_exception(&mut self, task: TaskId, handler: ExceptionHandlerFn) {
        self.hooks
            .exception_handlers
            .entry(task)
            .or_default()
            .push(handler);
    }

    /// Attach an exception handler run when no task handled the error
    pub fn on_unhandled_exception(&mut self, handler: ExceptionHandlerFn) {
        self.hooks.global_exception_handlers.push(handler);
    }

    /// Run a hook at the very end of every cycle
    pub fn at_cycle_end(&mut self, hook: CycleEndFn) {
        self.hooks.cycle_end.push(hook);
    }

    // ---- queueing ------------------------------------------------------

    /// Queue a call for the next propagation phase
    pub fn queue_call(&mut self, event: EventId, context: Vec<serde_json::Value>) {
        self.queues.calls.push_back((event, context));
    }

    /// Queue an emission for the next propagation phase
    pub fn queue_emit(&mut self, event: EventId, context: Vec<serde_json::Value>) {
        self.queues.emissions.push_back((event, context));
    }

    /// Queue a call of the task's start event
    pub fn queue_start(&mut self, task: TaskId) -> Result<(), EngineError> {
        let start = self.plan.bound_event(task, "start")?;
        self.queue_call(start, Vec::new());
        Ok(())
    }

    /// Queue a call of the task's stop event
    pub fn queue_stop(&mut self, task: TaskId) -> Result<(), EngineError> {
        let stop = self.plan.bound_event(task, "stop")?;
        self.queue_call(stop, Vec::new());
        Ok(())
    }

    // ---- promises ------------------------------------------------------

    /// Run a blocking job off-thread; the continuation is invoked from
    /// the gather phase of the cycle its completion arrives in.
    pub fn submit_promise(&mut self, job: PromiseJob, continuation: ContinuationFn) -> PromiseId {
        let id = self.promises.submit(job);
        self.continuations.insert(id, continuation);
        id
    }

    pub fn cancel_promise(&mut self, id: PromiseId) {
        self.promises.cancel(id);
        self.continuations.remove(&id);
    }

    pub fn pending_promises(&self) -> usize {
        self.promises.pending()
    }

    // ---- the cycle -----------------------------------------------------

    pub fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let start_time = self.clock.now();
        let span = tracing::info_span!("cycle", index = self.cycle_index);
        let _guard = span.enter();

        self.errored_tasks.clear();
        self.plan.clear_integrated()?;
        let plan = &self.plan;
        self.stop_requested.retain(|id| plan.task(*id).is_ok());

        let mut stats = CycleStats::default();

        self.gather();

        let propagation_id = self.next_propagation_id;
        self.next_propagation_id += 1;
        self.propagate(propagation_id, &mut stats);
        // Code errors surface as internal_error emissions of the same
        // cycle, which may in turn propagate further
        while self.queue_internal_error_emissions() {
            self.propagate(propagation_id, &mut stats);
        }

        let exceptions = self.process_exceptions(&mut stats);
        self.collect_garbage(&mut stats)?;

        stats.tasks_in_plan = self.plan.num_tasks();
        let report = CycleReport {
            cycle_index: self.cycle_index,
            start_time,
            end_time: self.clock.now(),
            changes: self.plan.drain_changes(),
            exceptions,
            stats,
        };

        let mut sink_error: Option<SinkError> = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.cycle_end(&report, &self.plan) {
                tracing::error!(error = %err, "cycle sink failed");
                sink_error.get_or_insert(err);
            }
        }

        self.run_cycle_end_hooks();
        self.cycle_index += 1;

        match sink_error {
            Some(err) => Err(EngineError::Sink(err.to_string())),
            None => Ok(report),
        }
    }

    /// Drive cycles until the plan is empty: roots are unmarked and
    /// idle quarantined tasks dropped, then the garbage collector does
    /// the rest.
    pub fn teardown(&mut self) -> Result<(), EngineError> {
        let max = self.config.teardown_max_cycles.max(1);
        for _ in 0..max {
            let missions: Vec<TaskId> = self.plan.missions().collect();
            for id in missions {
                self.plan.unmark_mission(id)?;
            }
            let permanents: Vec<TaskId> = self.plan.permanent_tasks().collect();
            for id in permanents {
                self.plan.unmark_permanent_task(id)?;
            }
            let events: Vec<EventId> = self.plan.permanent_events().collect();
            for id in events {
                self.plan.unmark_permanent_event(id)?;
            }
            let stuck: Vec<TaskId> = self
                .plan
                .tasks()
                .filter(|t| t.quarantined && !t.is_running())
                .map(|t| t.id)
                .collect();
            for id in stuck {
                self.plan.force_remove_task(id)?;
            }

            self.run_cycle()?;
            if self.plan.is_empty() {
                return Ok(());
            }
        }
        Err(EngineError::TeardownFailed {
            remaining: self.plan.num_tasks(),
            cycles: max,
        })
    }

    /// Close the sinks. Call once after the last cycle.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        let mut first: Option<SinkError> = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.close() {
                tracing::error!(error = %err, "cycle sink failed to close");
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(EngineError::Sink(err.to_string())),
            None => Ok(()),
        }
    }

    // ---- phases --------------------------------------------------------

    fn gather(&mut self) {
        for done in self.promises.drain_completions() {
            if let Some(continuation) = self.continuations.remove(&done.id) {
                let mut handle = PropagationHandle {
                    plan: &self.plan,
                    queues: &mut self.queues,
                };
                continuation(&mut handle, done.result);
            }
        }

        for (event, context) in self.scheduler.ready_events(&self.plan) {
            self.queues.calls.push_back((event, context));
        }
    }

    fn propagate(&mut self, propagation_id: u64, stats: &mut CycleStats) {
        loop {
            if let Some((event, context)) = self.queues.calls.pop_front() {
                stats.calls_processed += 1;
                self.process_call(event, context);
                continue;
            }
            if let Some((event, context)) = self.queues.emissions.pop_front() {
                self.fire(event, context, propagation_id, stats);
                continue;
            }
            break;
        }
    }

    fn process_call(&mut self, event: EventId, context: Vec<serde_json::Value>) {
        let now = self.clock.now();
        let Ok(generator) = self.plan.event(event) else {
            tracing::warn!(event = %event, "call on finalized generator dropped");
            return;
        };
        if self.plan.is_garbaged_event(event) {
            tracing::warn!(event = %event, "call on garbaged generator dropped");
            return;
        }
        if generator.unreachable {
            self.pending_errors.push(LocalizedError::new(
                ErrorKind::UnreachableEvent,
                FailurePoint::Event { event },
                "called an unreachable event",
                now,
            ));
            return;
        }
        if !generator.controlable {
            self.pending_errors.push(LocalizedError::new(
                ErrorKind::CommandFailed,
                FailurePoint::Event { event },
                "event is contingent and cannot be called",
                now,
            ));
            return;
        }
        let owner = generator.owner_task();
        let symbol = generator.symbol().map(str::to_string);
        let is_start = symbol.as_deref() == Some("start");

        if let Some(task_id) = owner {
            let Ok(task) = self.plan.task(task_id) else {
                return;
            };
            let quarantined = task.quarantined;
            let executable = task.executable();
            let pending = task.is_pending();
            let running = task.is_running();
            if is_start {
                if quarantined {
                    self.pending_errors.push(LocalizedError::new(
                        ErrorKind::QuarantinedTask,
                        FailurePoint::Task { task: task_id },
                        "start called on a quarantined task",
                        now,
                    ));
                    return;
                }
                if !executable {
                    self.pending_errors.push(LocalizedError::new(
                        ErrorKind::TaskNotExecutable,
                        FailurePoint::Task { task: task_id },
                        "task is not executable",
                        now,
                    ));
                    if pending {
                        if let Err(err) =
                            self.plan
                                .record_failed_to_start(task_id, "task is not executable", now)
                        {
                            tracing::warn!(task = %task_id, error = %err, "failed-to-start not recorded");
                        }
                    }
                    return;
                }
            } else if !running {
                let name = symbol.as_deref().unwrap_or("?");
                self.pending_errors.push(LocalizedError::new(
                    ErrorKind::CommandFailed,
                    FailurePoint::Task { task: task_id },
                    format!("called {name} on a task that is not running"),
                    now,
                ));
                return;
            }
        }

        if let Some(mut command) = self.hooks.commands.remove(&event) {
            let result = {
                let mut handle = PropagationHandle {
                    plan: &self.plan,
                    queues: &mut self.queues,
                };
                command(&mut handle, &context)
            };
            self.hooks.commands.insert(event, command);
            if let Err(err) = result {
                let now = self.clock.now();
                tracing::warn!(event = %event, error = %err, "command failed");
                self.pending_errors.push(LocalizedError::new(
                    ErrorKind::CommandFailed,
                    FailurePoint::Event { event },
                    err.to_string(),
                    now,
                ));
                if is_start {
                    if let Some(task_id) = owner {
                        if let Err(err) =
                            self.plan.record_failed_to_start(task_id, err.to_string(), now)
                        {
                            tracing::warn!(task = %task_id, error = %err, "failed-to-start not recorded");
                        }
                    }
                }
            }
        } else {
            // No command registered: a call is an emission request
            self.queues.emissions.push_back((event, context));
        }
    }

    fn fire(
        &mut self,
        event: EventId,
        context: Vec<serde_json::Value>,
        propagation_id: u64,
        stats: &mut CycleStats,
    ) {
        let now = self.clock.now();
        let flags = self
            .plan
            .event(event)
            .map(|g| (g.unreachable, g.owner_task(), g.symbol().map(str::to_string)));
        let Ok((unreachable, owner, symbol)) = flags else {
            tracing::warn!(event = %event, "emission for finalized generator dropped");
            return;
        };
        if self.plan.is_garbaged_event(event) {
            tracing::warn!(event = %event, "emission for garbaged generator dropped");
            return;
        }
        if unreachable {
            self.pending_errors.push(LocalizedError::new(
                ErrorKind::EmissionFailed,
                FailurePoint::Event { event },
                "emission on an unreachable event",
                now,
            ));
            return;
        }
        if let Some(task_id) = owner {
            let Ok(task) = self.plan.task(task_id) else {
                return;
            };
            let executable = task.executable();
            let pending = task.is_pending();
            let running = task.is_running();
            if symbol.as_deref() == Some("start") {
                if !executable {
                    self.pending_errors.push(LocalizedError::new(
                        ErrorKind::TaskNotExecutable,
                        FailurePoint::Task { task: task_id },
                        "task is not executable",
                        now,
                    ));
                    if pending {
                        if let Err(err) =
                            self.plan
                                .record_failed_to_start(task_id, "task is not executable", now)
                        {
                            tracing::warn!(task = %task_id, error = %err, "failed-to-start not recorded");
                        }
                    }
                    return;
                }
            } else if !running {
                let name = symbol.as_deref().unwrap_or("?");
                self.pending_errors.push(LocalizedError::new(
                    ErrorKind::EmissionFailed,
                    FailurePoint::Task { task: task_id },
                    format!("emitted {name} on a task that is not running"),
                    now,
                ));
                return;
            }
        }

        if let Err(err) = self
            .plan
            .record_emission(event, context.clone(), propagation_id, now)
        {
            tracing::warn!(event = %event, error = %err, "emission not recorded");
            return;
        }
        stats.emissions += 1;

        if symbol.as_deref() == Some("failed") {
            if let Some(task_id) = owner {
                if self.plan.is_mission(task_id) {
                    self.pending_errors.push(LocalizedError::new(
                        ErrorKind::MissionFailed,
                        FailurePoint::Task { task: task_id },
                        "mission emitted failed",
                        now,
                    ));
                }
            }
        }

        let Some(occurrence) = self.plan.event(event).ok().and_then(|g| g.last().cloned()) else {
            return;
        };
        if let Some(mut handlers) = self.hooks.handlers.remove(&event) {
            for handler in handlers.iter_mut() {
                let result = {
                    let mut handle = PropagationHandle {
                        plan: &self.plan,
                        queues: &mut self.queues,
                    };
                    handler(&mut handle, &occurrence)
                };
                if let Err(err) = result {
                    tracing::warn!(event = %event, error = %err, "handler failed");
                    let point = match owner {
                        Some(task) => FailurePoint::Task { task },
                        None => FailurePoint::Event { event },
                    };
                    self.pending_errors.push(LocalizedError::new(
                        ErrorKind::CodeError,
                        point,
                        err.to_string(),
                        self.clock.now(),
                    ));
                }
            }
            self.hooks.handlers.insert(event, handlers);
        }

        // Forwards re-emit, signals call, both in insertion order
        let forwards: Vec<EventId> = self
            .plan
            .event_children(EventRelation::Forward, event)
            .map(|(child, _)| child)
            .collect();
        for child in forwards {
            self.queues.emissions.push_back((child, context.clone()));
        }
        let signals: Vec<EventId> = self
            .plan
            .event_children(EventRelation::Signal, event)
            .map(|(child, _)| child)
            .collect();
        for child in signals {
            self.queues.calls.push_back((child, context.clone()));
        }
    }

    /// Queue internal_error emissions for tasks with fresh code errors.
    /// Returns whether anything was queued.
    fn queue_internal_error_emissions(&mut self) -> bool {
        let candidates: Vec<TaskId> = self
            .pending_errors
            .iter()
            .filter(|e| e.kind == ErrorKind::CodeError)
            .filter_map(|e| match e.failure_point {
                FailurePoint::Task { task } => Some(task),
                FailurePoint::Event { event } => {
                    self.plan.event(event).ok().and_then(|g| g.owner_task())
                }
            })
            .collect();

        let mut queued = false;
        for task_id in candidates {
            if self.errored_tasks.contains(&task_id) {
                continue;
            }
            let Ok(task) = self.plan.task(task_id) else {
                continue;
            };
            if task.is_terminal() {
                continue;
            }
            if let Some(internal_error) = task.event("internal_error") {
                self.errored_tasks.insert(task_id);
                self.queues.emissions.push_back((internal_error, Vec::new()));
                queued = true;
            }
        }
        queued
    }

    fn process_exceptions(&mut self, stats: &mut CycleStats) -> Vec<ExecutionException> {
        let errors = std::mem::take(&mut self.pending_errors);
        let mut out = Vec::new();
        for error in errors {
            stats.exceptions_raised += 1;
            let mut exception = ExecutionException::new(error);
            self.route_exception(&mut exception);
            if !exception.handled {
                if let Some(origin) = self.origin_task(&exception) {
                    tracing::warn!(
                        task = %origin,
                        kind = ?exception.error.kind,
                        "unhandled exception, quarantining its origin"
                    );
                    if let Err(err) = self
                        .plan
                        .quarantine(origin, format!("unhandled {:?}", exception.error.kind))
                    {
                        tracing::debug!(task = %origin, error = %err, "quarantine skipped");
                    }
                }
            }
            out.push(exception);
        }
        out
    }

    fn origin_task(&self, exception: &ExecutionException) -> Option<TaskId> {
        match exception.error.failure_point {
            FailurePoint::Task { task } => Some(task),
            FailurePoint::Event { event } => {
                self.plan.event(event).ok().and_then(|g| g.owner_task())
            }
        }
    }

    /// Walk the exception up the dependency graph, breadth first.
    /// Handlers run per task; the first one that returns true stops the
    /// walk. Exceptions that reach the roots unhandled get a last
    /// chance with the global handlers.
    fn route_exception(&mut self, exception: &mut ExecutionException) {
        let Some(origin) = self.origin_task(exception) else {
            if self.run_global_exception_handlers(exception) {
                exception.handled = true;
            }
            return;
        };

        let mut queue = VecDeque::from([origin]);
        let mut visited = BTreeSet::from([origin]);
        while let Some(current) = queue.pop_front() {
            if self.run_task_exception_handlers(current, exception) {
                exception.handled = true;
                return;
            }
            let parents: Vec<TaskId> = self
                .plan
                .task_parents(TaskRelation::Dependency, current)
                .collect();
            for parent in parents {
                if visited.insert(parent) {
                    exception.trace.push((current, parent));
                    queue.push_back(parent);
                }
            }
        }

        if self.run_global_exception_handlers(exception) {
            exception.handled = true;
        }
    }

    fn run_task_exception_handlers(
        &mut self,
        task: TaskId,
        exception: &ExecutionException,
    ) -> bool {
        let Some(mut handlers) = self.hooks.exception_handlers.remove(&task) else {
            return false;
        };
        let mut handled = false;
        {
            let mut handle = PropagationHandle {
                plan: &self.plan,
                queues: &mut self.queues,
            };
            for handler in handlers.iter_mut() {
                if handler(&mut handle, exception) {
                    handled = true;
                    break;
                }
            }
        }
        self.hooks.exception_handlers.insert(task, handlers);
        handled
    }

    fn run_global_exception_handlers(&mut self, exception: &ExecutionException) -> bool {
        let mut handlers = std::mem::take(&mut self.hooks.global_exception_handlers);
        let mut handled = false;
        {
            let mut handle = PropagationHandle {
                plan: &self.plan,
                queues: &mut self.queues,
            };
            for handler in handlers.iter_mut() {
                if handler(&mut handle, exception) {
                    handled = true;
                    break;
                }
            }
        }
        self.hooks.global_exception_handlers = handlers;
        handled
    }

    /// Stop or mark everything no longer reachable from the roots.
    /// Running tasks get one stop call and are collected once they
    /// finish; running tasks without a controlable stop are
    /// quarantined.
    fn collect_garbage(&mut self, stats: &mut CycleStats) -> Result<(), EngineError> {
        for task_id in self.plan.unneeded_tasks() {
            let Ok(task) = self.plan.task(task_id) else {
                continue;
            };
            let running = task.is_running();
            let stop = task.stop_event();
            if running {
                let stop_controlable = stop
                    .and_then(|id| self.plan.event(id).ok())
                    .map(|g| g.controlable)
                    .unwrap_or(false);
                if stop_controlable {
                    if self.stop_requested.insert(task_id) {
                        if let Some(stop) = stop {
                            tracing::debug!(task = %task_id, "stopping unneeded task");
                            self.queues.calls.push_back((stop, Vec::new()));
                        }
                    }
                } else {
                    tracing::warn!(task = %task_id, "unneeded running task cannot be stopped");
                    self.plan
                        .quarantine(task_id, "garbage collection cannot stop this task")?;
                }
            } else {
                self.plan.mark_garbaged_task(task_id)?;
                stats.garbage_collected += 1;
            }
        }

        for event_id in self.plan.unneeded_events() {
            self.plan.mark_garbaged_event(event_id)?;
            stats.garbage_collected += 1;
        }
        Ok(())
    }

    fn run_cycle_end_hooks(&mut self) {
        let mut hooks = std::mem::take(&mut self.hooks.cycle_end);
        {
            let mut handle = PropagationHandle {
                plan: &self.plan,
                queues: &mut self.queues,
            };
            for hook in hooks.iter_mut() {
                if let Err(err) = hook(&mut handle) {
                    tracing::error!(error = %err, "cycle-end hook failed");
                }
            }
        }
        self.hooks.cycle_end = hooks;
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
