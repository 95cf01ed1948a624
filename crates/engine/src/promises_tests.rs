// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::time::{Duration, Instant};

fn wait_for_completions(pool: &mut PromisePool, count: usize) -> Vec<Completion> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut out = Vec::new();
    while out.len() < count {
        out.extend(pool.drain_completions());
        if Instant::now() > deadline {
            panic!("timed out waiting for {count} completions, got {}", out.len());
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    out
}

#[test]
fn completed_jobs_come_back_through_drain() {
    let mut pool = PromisePool::new(2);
    let id = pool.submit(Box::new(|| Ok(json!(21 * 2))));

    let done = wait_for_completions(&mut pool, 1);
    assert_eq!(done[0].id, id);
    assert_eq!(done[0].result, Ok(json!(42)));
    assert_eq!(pool.pending(), 0);
}

#[test]
fn panicking_jobs_become_errors() {
    let mut pool = PromisePool::new(1);
    pool.submit(Box::new(|| panic!("boom")));

    let done = wait_for_completions(&mut pool, 1);
    assert_eq!(done[0].result, Err("promise panicked".to_string()));
}

#[test]
fn cancelled_promises_are_discarded_at_drain() {
    let mut pool = PromisePool::new(1);
    let id = pool.submit(Box::new(|| Ok(json!("late"))));
    pool.cancel(id);

    // Give the worker time to finish the job anyway
    std::thread::sleep(Duration::from_millis(50));
    assert!(pool.drain_completions().is_empty());
    assert_eq!(pool.pending(), 0);
}

#[test]
fn jobs_submitted_concurrently_all_complete() {
    let mut pool = PromisePool::new(4);
    let mut ids = Vec::new();
    for n in 0u64..16 {
        ids.push(pool.submit(Box::new(move || Ok(json!(n)))));
    }

    let mut done = wait_for_completions(&mut pool, 16);
    done.sort_by_key(|c| c.id);
    let ids_done: Vec<PromiseId> = done.iter().map(|c| c.id).collect();
    assert_eq!(ids_done, ids);
}
