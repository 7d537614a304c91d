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

use crate::error::Result;
use crate::locking::manager::LockManager;
use crate::locking::owner::OwnerId;
use crate::locking::registry::LockHandle;
use log::warn;
use std::time::Duration;

/// RAII guard that releases a granted lock when dropped.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    handle: LockHandle,
    owner: OwnerId,
    waited: Duration,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub(crate) fn new(
        manager: &'a LockManager,
        handle: LockHandle,
        owner: OwnerId,
        waited: Duration,
    ) -> Self {
        Self {
            manager,
            handle,
            owner,
            waited,
            released: false,
        }
    }

    pub fn handle(&self) -> &LockHandle {
        &self.handle
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// How long the acquisition waited before being granted.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.manager.release(self.owner, &self.handle)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.manager.release(self.owner, &self.handle) {
            warn!(
                "Failed to release '{}' for {} during drop: {err}",
                self.handle.name(),
                self.owner
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::policy::DeadlockPolicy;

    #[test]
    fn drop_releases_the_lock() {
        let manager = LockManager::new(DeadlockPolicy::Decline);
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();
        {
            let guard = manager.acquire_scoped(owner, &handle).unwrap().unwrap();
            assert_eq!(guard.waited(), Duration::ZERO);
            assert_eq!(guard.owner(), owner);
        }
        // Released on drop, so another owner gets it immediately.
        let other = OwnerId::next();
        assert!(manager.acquire(other, &handle).unwrap().is_granted());
        manager.release(other, &handle).unwrap();
    }

    #[test]
    fn explicit_release_returns_ok() {
        let manager = LockManager::new(DeadlockPolicy::Decline);
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();

        let guard = manager.acquire_scoped(owner, &handle).unwrap().unwrap();
        guard.release().unwrap();
        manager.teardown(&handle).unwrap();
    }

    #[test]
    fn declined_acquisition_yields_no_guard() {
        let manager = LockManager::new(DeadlockPolicy::Decline);
        let handle = manager.register("cache").unwrap();
        let owner = OwnerId::next();

        let held = manager.acquire_scoped(owner, &handle).unwrap().unwrap();
        assert!(manager.acquire_scoped(owner, &handle).unwrap().is_none());
        held.release().unwrap();
    }
}
