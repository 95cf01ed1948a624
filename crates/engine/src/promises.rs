// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool for blocking work
//!
//! The cycle must never block, so anything slow is submitted here as a
//! promise: the job runs on a worker thread and its completion is
//! picked up by the engine's gather phase on a later cycle. Cancelling
//! a promise only drops interest in it; a completion that arrives for
//! a cancelled promise is discarded at drain time.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

/// Identifier for one submitted promise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(pub u64);

/// The work a promise runs on a worker thread
pub type PromiseJob = Box<dyn FnOnce() -> Result<serde_json::Value, String> + Send>;

struct WorkItem {
    id: PromiseId,
    job: PromiseJob,
}

/// A finished promise
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: PromiseId,
    pub result: Result<serde_json::Value, String>,
}

/// Fixed-size worker pool feeding completions back to the engine
pub struct PromisePool {
    work_tx: Option<Sender<WorkItem>>,
    done_rx: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    next_id: u64,
    live: BTreeSet<PromiseId>,
}

impl PromisePool {
    pub fn new(worker_count: usize) -> Self {
        let (work_tx, work_rx) = unbounded::<WorkItem>();
        let (done_tx, done_rx) = unbounded::<Completion>();

        let mut workers = Vec::new();
        for index in 0..worker_count.max(1) {
            let rx = work_rx.clone();
            let tx = done_tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("promise-{index}"))
                .spawn(move || {
                    while let Ok(item) = rx.recv() {
                        let result = catch_unwind(AssertUnwindSafe(item.job))
                            .unwrap_or_else(|_| Err("promise panicked".to_string()));
                        if tx.send(Completion { id: item.id, result }).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => tracing::warn!(error = %err, "failed to spawn promise worker"),
            }
        }

        Self {
            work_tx: Some(work_tx),
            done_rx,
            workers,
            next_id: 1,
            live: BTreeSet::new(),
        }
    }

    /// Hand a job to the pool
    pub fn submit(&mut self, job: PromiseJob) -> PromiseId {
        let id = PromiseId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        if let Some(tx) = &self.work_tx {
            if tx.send(WorkItem { id, job }).is_err() {
                tracing::warn!(promise = id.0, "promise pool is shut down, job dropped");
                self.live.remove(&id);
            }
        }
        id
    }

    /// Drop interest in a promise. The job may still run to completion
    /// on its worker, but the result will be discarded.
    pub fn cancel(&mut self, id: PromiseId) {
        self.live.remove(&id);
    }

    /// Promises submitted and neither completed nor cancelled
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Completions that arrived since the last drain
    pub fn drain_completions(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(done) = self.done_rx.try_recv() {
            if self.live.remove(&done.id) {
                out.push(done);
            } else {
                tracing::debug!(promise = done.id.0, "discarding stale promise completion");
            }
        }
        out
    }
}

impl Drop for PromisePool {
    fn drop(&mut self) {
        // Closing the work channel lets the workers drain and exit
        self.work_tx = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "promises_tests.rs"]
mod tests;
