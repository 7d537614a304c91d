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

//! Process-lifetime table of named locks.
//!
//! Entries live in an arena indexed by stable [`LockId`]s; freed slots are
//! never reused, so a stale handle resolves to `NotFound` rather than to an
//! unrelated lock. All mutation happens under the manager mutex, which makes
//! every compound operation here linearizable with respect to concurrent
//! acquire/release calls.

use crate::error::{DeadboltError, Result};
use crate::locking::owner::OwnerId;
use crate::locking::snapshot::LockSnapshot;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

/// Stable index of a lock in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(usize);

/// Cheap handle naming a registered lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    id: LockId,
    name: String,
}

impl LockHandle {
    fn new(id: LockId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> LockId {
        self.id
    }
}

/// Usage counters kept per lock, reported through snapshots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LockStats {
    pub grants: u64,
    pub releases: u64,
    pub declines: u64,
}

/// Book-keeping for one registered lock.
#[derive(Debug)]
pub(crate) struct LockEntry {
    pub(crate) name: String,
    pub(crate) holder: Option<OwnerId>,
    pub(crate) held_since: Option<DateTime<Utc>>,
    pub(crate) waiters: VecDeque<OwnerId>,
    pub(crate) stats: LockStats,
}

impl LockEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            holder: None,
            held_since: None,
            waiters: VecDeque::new(),
            stats: LockStats::default(),
        }
    }

    fn grant_to(&mut self, owner: OwnerId) {
        self.holder = Some(owner);
        self.held_since = Some(Utc::now());
        self.stats.grants += 1;
    }

    fn is_idle(&self) -> bool {
        self.holder.is_none() && self.waiters.is_empty()
    }

    fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            name: self.name.clone(),
            holder: self.holder,
            held_since: self.held_since,
            waiters: self.waiters.iter().copied().collect(),
            stats: self.stats.clone(),
        }
    }
}

/// Mutable state shared by the acquisition and release engines.
#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    entries: Vec<Option<LockEntry>>,
    by_name: HashMap<String, LockId>,
    waiting_on: HashMap<OwnerId, LockId>,
}

impl RegistryState {
    /// Creates the lock if absent, otherwise returns a handle to the
    /// existing one.
    pub(crate) fn register(&mut self, name: &str) -> LockHandle {
        if let Some(id) = self.by_name.get(name) {
            return LockHandle::new(*id, name);
        }
        self.create(name)
    }

    /// Strict creation: fails if the name is already registered.
    pub(crate) fn try_register(&mut self, name: &str) -> Result<LockHandle> {
        if self.by_name.contains_key(name) {
            return Err(DeadboltError::DuplicateIdentity(name.to_string()));
        }
        Ok(self.create(name))
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<LockHandle> {
        self.by_name
            .get(name)
            .map(|id| LockHandle::new(*id, name))
            .ok_or_else(|| DeadboltError::NotFound(name.to_string()))
    }

    fn create(&mut self, name: &str) -> LockHandle {
        let id = LockId(self.entries.len());
        self.entries.push(Some(LockEntry::new(name)));
        self.by_name.insert(name.to_string(), id);
        LockHandle::new(id, name)
    }

    pub(crate) fn entry(&self, handle: &LockHandle) -> Result<&LockEntry> {
        self.entries
            .get(handle.id().0)
            .and_then(Option::as_ref)
            .ok_or_else(|| DeadboltError::NotFound(handle.name().to_string()))
    }

    fn entry_mut(&mut self, handle: &LockHandle) -> Result<&mut LockEntry> {
        self.entries
            .get_mut(handle.id().0)
            .and_then(Option::as_mut)
            .ok_or_else(|| DeadboltError::NotFound(handle.name().to_string()))
    }

    /// Grants the lock immediately if it has no holder. Returns `false`
    /// when the lock is busy.
    pub(crate) fn grant_if_free(&mut self, handle: &LockHandle, owner: OwnerId) -> Result<bool> {
        let entry = self.entry_mut(handle)?;
        if entry.holder.is_some() {
            return Ok(false);
        }
        entry.grant_to(owner);
        Ok(true)
    }

    /// Appends `owner` to the FIFO waiter queue and records the derived
    /// wait-for edge. The caller must have ruled out a cycle first.
    pub(crate) fn enqueue_waiter(&mut self, handle: &LockHandle, owner: OwnerId) -> Result<()> {
        let id = handle.id();
        let entry = self.entry_mut(handle)?;
        debug_assert!(!entry.waiters.contains(&owner));
        entry.waiters.push_back(owner);
        self.waiting_on.insert(owner, id);
        Ok(())
    }

    pub(crate) fn record_decline(&mut self, handle: &LockHandle) -> Result<()> {
        self.entry_mut(handle)?.stats.declines += 1;
        Ok(())
    }

    /// Releases the lock held by `owner`. If waiters are queued, the head
    /// waiter becomes the holder in the same step and its wait-for edge is
    /// dropped; the granted owner is returned so the caller can wake it.
    pub(crate) fn release_holder(
        &mut self,
        handle: &LockHandle,
        owner: OwnerId,
    ) -> Result<Option<OwnerId>> {
        let entry = self.entry_mut(handle)?;
        if entry.holder != Some(owner) {
            return Err(DeadboltError::NotHolder {
                name: handle.name().to_string(),
                owner,
            });
        }
        entry.stats.releases += 1;
        match entry.waiters.pop_front() {
            Some(next) => {
                entry.grant_to(next);
                self.waiting_on.remove(&next);
                Ok(Some(next))
            }
            None => {
                entry.holder = None;
                entry.held_since = None;
                Ok(None)
            }
        }
    }

    /// Removes the lock. Fails with `LockBusy` while it is held or waited on.
    pub(crate) fn teardown(&mut self, handle: &LockHandle) -> Result<()> {
        let entry = self.entry(handle)?;
        if !entry.is_idle() {
            return Err(busy_error(entry));
        }
        self.by_name.remove(handle.name());
        self.entries[handle.id().0] = None;
        Ok(())
    }

    /// Removes every registered lock, failing on the first busy one.
    pub(crate) fn teardown_all(&mut self) -> Result<()> {
        if let Some(busy) = self
            .entries
            .iter()
            .flatten()
            .find(|entry| !entry.is_idle())
        {
            return Err(busy_error(busy));
        }
        self.entries.clear();
        self.by_name.clear();
        Ok(())
    }

    pub(crate) fn holder_of(&self, id: LockId) -> Option<OwnerId> {
        self.entries.get(id.0).and_then(Option::as_ref)?.holder
    }

    /// The lock a parked owner is currently waiting for, if any.
    pub(crate) fn awaited_by(&self, owner: OwnerId) -> Option<LockId> {
        self.waiting_on.get(&owner).copied()
    }

    pub(crate) fn blocked_count(&self) -> usize {
        self.waiting_on.len()
    }

    pub(crate) fn snapshots(&self) -> Vec<LockSnapshot> {
        self.entries
            .iter()
            .flatten()
            .map(LockEntry::snapshot)
            .collect()
    }
}

fn busy_error(entry: &LockEntry) -> DeadboltError {
    let details = match entry.holder {
        Some(holder) => format!("held by {holder}, {} waiting", entry.waiters.len()),
        None => format!("{} owners waiting", entry.waiters.len()),
    };
    DeadboltError::LockBusy {
        name: entry.name.clone(),
        details,
    }
}
