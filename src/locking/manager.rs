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

//! Acquisition and release engines.
//!
//! A single mutex guards the whole registry, so the cycle check and the
//! enqueue-as-waiter it gates are one critical section: no interleaving can
//! grant a cycle-creating wait between the check and the park. Release hands
//! the lock directly to the head waiter under the same mutex, so a grant is
//! atomic with respect to every other acquire and release.

use crate::config::DeadboltConfig;
use crate::error::Result;
use crate::locking::guard::LockGuard;
use crate::locking::owner::OwnerId;
use crate::locking::policy::DeadlockPolicy;
use crate::locking::registry::{LockHandle, RegistryState};
use crate::locking::snapshot::LockSnapshot;
use crate::locking::wait_graph::WaitForGraph;
use log::{debug, error, warn};
use std::process;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// The caller now holds the lock.
    Granted { waited: Duration },
    /// Granting would have closed a wait-for cycle; the lock was refused
    /// without blocking. A normal result, not an error.
    Declined,
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted { .. })
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Acquisition::Declined)
    }

    pub fn waited(&self) -> Option<Duration> {
        match self {
            Acquisition::Granted { waited } => Some(*waited),
            Acquisition::Declined => None,
        }
    }
}

/// Deadlock-aware manager for named mutual-exclusion locks.
///
/// Construct one per process (or per test) and share it by reference; the
/// policy is fixed for the manager's lifetime.
pub struct LockManager {
    policy: DeadlockPolicy,
    state: Mutex<RegistryState>,
    granted: Condvar,
}

impl LockManager {
    pub fn new(policy: DeadlockPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(RegistryState::default()),
            granted: Condvar::new(),
        }
    }

    pub fn with_config(config: &DeadboltConfig) -> Self {
        Self::new(config.on_deadlock)
    }

    pub fn policy(&self) -> DeadlockPolicy {
        self.policy
    }

    /// Creates the named lock if absent; idempotent otherwise.
    pub fn register(&self, name: &str) -> Result<LockHandle> {
        Ok(self.state().register(name))
    }

    /// Strict creation semantics: `DuplicateIdentity` if the name exists.
    pub fn try_register(&self, name: &str) -> Result<LockHandle> {
        self.state().try_register(name)
    }

    pub fn lookup(&self, name: &str) -> Result<LockHandle> {
        self.state().lookup(name)
    }

    /// Removes the lock; `LockBusy` while it is held or waited on.
    pub fn teardown(&self, handle: &LockHandle) -> Result<()> {
        self.state().teardown(handle)
    }

    /// Removes every registered lock, failing on the first busy one.
    pub fn teardown_all(&self) -> Result<()> {
        self.state().teardown_all()
    }

    /// Attempts to take the lock for `owner`.
    ///
    /// Blocks only when the lock is busy and waiting cannot close a wait-for
    /// cycle. When a cycle is detected the configured [`DeadlockPolicy`]
    /// applies: `Abort` terminates the process, `Decline` returns
    /// [`Acquisition::Declined`] immediately.
    pub fn acquire(&self, owner: OwnerId, handle: &LockHandle) -> Result<Acquisition> {
        let start = Instant::now();
        let mut state = self.state();

        if state.grant_if_free(handle, owner)? {
            debug!("{owner} acquired '{}'", handle.name());
            return Ok(Acquisition::Granted {
                waited: Duration::ZERO,
            });
        }

        // Covers the self-reacquisition case too: the holder chain starts at
        // this owner, which reads as a one-hop cycle.
        if WaitForGraph::new(&state).would_cycle(owner, handle.id()) {
            state.record_decline(handle)?;
            match self.policy {
                DeadlockPolicy::Abort => {
                    error!(
                        "circular wait: granting '{}' to {owner} would deadlock; aborting",
                        handle.name()
                    );
                    process::abort();
                }
                DeadlockPolicy::Decline => {
                    debug!(
                        "declined '{}' for {owner}: acquisition would deadlock",
                        handle.name()
                    );
                    return Ok(Acquisition::Declined);
                }
            }
        }

        state.enqueue_waiter(handle, owner)?;
        debug!("{owner} waiting for '{}'", handle.name());

        loop {
            state = self
                .granted
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            if state.entry(handle)?.holder == Some(owner) {
                let waited = start.elapsed();
                debug!(
                    "{owner} acquired '{}' after {:.3}s",
                    handle.name(),
                    waited.as_secs_f64()
                );
                return Ok(Acquisition::Granted { waited });
            }
        }
    }

    /// RAII variant of [`acquire`](Self::acquire); `None` on decline.
    pub fn acquire_scoped(&self, owner: OwnerId, handle: &LockHandle) -> Result<Option<LockGuard<'_>>> {
        match self.acquire(owner, handle)? {
            Acquisition::Granted { waited } => {
                Ok(Some(LockGuard::new(self, handle.clone(), owner, waited)))
            }
            Acquisition::Declined => Ok(None),
        }
    }

    /// Releases a lock held by `owner`.
    ///
    /// `NotHolder` if the owner does not hold it; nothing is mutated in that
    /// case. Otherwise the head waiter, if any, becomes the holder and is
    /// woken.
    pub fn release(&self, owner: OwnerId, handle: &LockHandle) -> Result<()> {
        let mut state = self.state();
        match state.release_holder(handle, owner) {
            Ok(Some(next)) => {
                debug!("'{}' handed off from {owner} to {next}", handle.name());
                self.granted.notify_all();
                Ok(())
            }
            Ok(None) => {
                debug!("{owner} released '{}'", handle.name());
                Ok(())
            }
            Err(err) => {
                warn!("{owner} failed to release '{}': {err}", handle.name());
                Err(err)
            }
        }
    }

    /// Consistent point-in-time view of every registered lock.
    pub fn snapshot(&self) -> Vec<LockSnapshot> {
        self.state().snapshots()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // A poisoning panic cannot leave the registry half-updated: every
        // mutation is a single compound call on RegistryState.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeadboltError;

    fn manager() -> LockManager {
        LockManager::new(DeadlockPolicy::Decline)
    }

    #[test]
    fn free_lock_is_granted_immediately() {
        let manager = manager();
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();

        let outcome = manager.acquire(owner, &handle).unwrap();
        assert_eq!(outcome.waited(), Some(Duration::ZERO));
        manager.release(owner, &handle).unwrap();
    }

    #[test]
    fn self_reacquisition_is_declined() {
        let manager = manager();
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();

        assert!(manager.acquire(owner, &handle).unwrap().is_granted());
        assert!(manager.acquire(owner, &handle).unwrap().is_declined());

        let snapshot = manager.snapshot();
        assert_eq!(snapshot[0].stats.declines, 1);
        assert!(snapshot[0].waiters.is_empty());
        manager.release(owner, &handle).unwrap();
    }

    #[test]
    fn release_without_holding_fails() {
        let manager = manager();
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();
        let impostor = OwnerId::next();

        assert!(manager.acquire(owner, &handle).unwrap().is_granted());
        let err = manager.release(impostor, &handle).unwrap_err();
        assert!(matches!(err, DeadboltError::NotHolder { .. }));

        // The real holder can still release.
        manager.release(owner, &handle).unwrap();
    }

    #[test]
    fn acquire_after_teardown_fails() {
        let manager = manager();
        let handle = manager.register("cache").unwrap();
        manager.teardown(&handle).unwrap();

        let err = manager.acquire(OwnerId::next(), &handle).unwrap_err();
        assert!(matches!(err, DeadboltError::NotFound(name) if name == "cache"));
    }

    #[test]
    fn teardown_all_after_release_succeeds() {
        let manager = manager();
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();

        assert!(manager.acquire(owner, &handle).unwrap().is_granted());
        assert!(manager.teardown_all().is_err());
        manager.release(owner, &handle).unwrap();
        manager.teardown_all().unwrap();
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn policy_is_fixed_at_construction() {
        let manager = LockManager::new(DeadlockPolicy::Abort);
        assert_eq!(manager.policy(), DeadlockPolicy::Abort);
    }

    #[test]
    fn grant_and_release_update_stats() {
        let manager = manager();
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();

        assert!(manager.acquire(owner, &handle).unwrap().is_granted());
        manager.release(owner, &handle).unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot[0].stats.grants, 1);
        assert_eq!(snapshot[0].stats.releases, 1);
        assert_eq!(snapshot[0].holder, None);
    }
}
