// Copyright 2025 the deadbolt authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Demonstration workloads driven by the `deadbolt` binary.
//!
//! `deadlock` pits two workers against each other with opposite lock
//! ordering; every iteration both workers hold their first lock before either
//! requests the second, so a circular wait is attempted each round. Under the
//! abort policy the process dies with SIGABRT on the first attempt; under the
//! decline policy the offending acquisition is refused and both workers run
//! to completion.

use crate::config::DemoConfig;
use crate::error::{DeadboltError, Result};
use crate::locking::{LockHandle, LockManager, OwnerId};
use log::info;
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Two workers contending on a single lock; no cycle is ever possible.
pub fn run_basic(manager: Arc<LockManager>, demo: &DemoConfig) -> Result<()> {
    let handle = manager.register("simpleton")?;
    let mut workers = Vec::new();
    for _ in 0..2 {
        let manager = Arc::clone(&manager);
        let handle = handle.clone();
        let demo = demo.clone();
        workers.push(thread::spawn(move || basic_worker(&manager, &handle, &demo)));
    }
    join_workers(workers)?;
    print_report(&manager);
    manager.teardown_all()
}

/// Two workers, two locks, opposite acquisition order.
pub fn run_deadlock(manager: Arc<LockManager>, demo: &DemoConfig) -> Result<()> {
    let alpha = manager.register("alpha")?;
    let beta = manager.register("beta")?;
    let barrier = Arc::new(Barrier::new(2));

    let mut workers = Vec::new();
    for (outer, inner) in [(alpha.clone(), beta.clone()), (beta, alpha)] {
        let manager = Arc::clone(&manager);
        let barrier = Arc::clone(&barrier);
        let demo = demo.clone();
        workers.push(thread::spawn(move || {
            deadlock_worker(&manager, &outer, &inner, &barrier, &demo)
        }));
    }
    join_workers(workers)?;
    print_report(&manager);
    manager.teardown_all()
}

fn basic_worker(manager: &LockManager, handle: &LockHandle, demo: &DemoConfig) -> Result<()> {
    let owner = OwnerId::current();
    for ix in 0..demo.iterations {
        if manager.acquire(owner, handle)?.is_granted() {
            info!("{owner} doing some work with '{}' ({ix})", handle.name());
            thread::sleep(Duration::from_millis(demo.hold_millis));
            manager.release(owner, handle)?;
        }
    }
    Ok(())
}

fn deadlock_worker(
    manager: &LockManager,
    outer: &LockHandle,
    inner: &LockHandle,
    barrier: &Barrier,
    demo: &DemoConfig,
) -> Result<()> {
    let owner = OwnerId::current();
    for ix in 0..demo.iterations {
        if manager.acquire(owner, outer)?.is_granted() {
            // Both workers hold their outer lock before either requests the
            // inner one, so the circular wait is attempted every iteration.
            barrier.wait();
            if manager.acquire(owner, inner)?.is_granted() {
                info!(
                    "{owner} doing some work with '{}', '{}' ({ix})",
                    outer.name(),
                    inner.name()
                );
                thread::sleep(Duration::from_millis(demo.hold_millis));
                manager.release(owner, inner)?;
            }
            manager.release(owner, outer)?;
        }
    }
    Ok(())
}

fn join_workers(workers: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    for worker in workers {
        worker
            .join()
            .map_err(|_| DeadboltError::SystemError("demo worker panicked".to_string()))??;
    }
    Ok(())
}

fn print_report(manager: &LockManager) {
    for snapshot in manager.snapshot() {
        println!("{snapshot}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::DeadlockPolicy;

    fn quick_demo() -> DemoConfig {
        DemoConfig {
            iterations: 3,
            hold_millis: 1,
        }
    }

    #[test]
    fn basic_scenario_completes_under_either_policy() {
        for policy in [DeadlockPolicy::Abort, DeadlockPolicy::Decline] {
            let manager = Arc::new(LockManager::new(policy));
            run_basic(manager, &quick_demo()).unwrap();
        }
    }

    #[test]
    fn deadlock_scenario_completes_when_declining() {
        let manager = Arc::new(LockManager::new(DeadlockPolicy::Decline));
        run_deadlock(manager, &quick_demo()).unwrap();
    }
}
