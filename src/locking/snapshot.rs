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

use crate::locking::owner::OwnerId;
use crate::locking::registry::LockStats;
use chrono::{DateTime, Utc};
use std::fmt;

/// Point-in-time view of one registered lock, taken under the manager mutex.
#[derive(Debug, Clone)]
pub struct LockSnapshot {
    pub name: String,
    pub holder: Option<OwnerId>,
    pub held_since: Option<DateTime<Utc>>,
    pub waiters: Vec<OwnerId>,
    pub stats: LockStats,
}

impl fmt::Display for LockSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=====================================")?;
        writeln!(f, "Lock: {}", self.name)?;
        match (self.holder, self.held_since) {
            (Some(holder), Some(since)) => {
                writeln!(f, "Holder: {holder} (since {})", since.to_rfc3339())?
            }
            (Some(holder), None) => writeln!(f, "Holder: {holder}")?,
            _ => writeln!(f, "Holder: none")?,
        }
        if self.waiters.is_empty() {
            writeln!(f, "Waiters: none")?;
        } else {
            let waiters: Vec<String> = self.waiters.iter().map(OwnerId::to_string).collect();
            writeln!(f, "Waiters: {}", waiters.join(", "))?;
        }
        writeln!(
            f,
            "Grants: {}  Releases: {}  Declines: {}",
            self.stats.grants, self.stats.releases, self.stats.declines
        )?;
        write!(f, "=====================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_holder_and_waiters() {
        let holder = OwnerId::next();
        let waiter = OwnerId::next();
        let snapshot = LockSnapshot {
            name: "alpha".to_string(),
            holder: Some(holder),
            held_since: Some(Utc::now()),
            waiters: vec![waiter],
            stats: LockStats {
                grants: 3,
                releases: 2,
                declines: 1,
            },
        };

        let report = snapshot.to_string();
        assert!(report.contains("Lock: alpha"));
        assert!(report.contains(&format!("Holder: {holder}")));
        assert!(report.contains(&waiter.to_string()));
        assert!(report.contains("Grants: 3  Releases: 2  Declines: 1"));
    }

    #[test]
    fn idle_lock_reports_none() {
        let snapshot = LockSnapshot {
            name: "idle".to_string(),
            holder: None,
            held_since: None,
            waiters: Vec::new(),
            stats: LockStats::default(),
        };

        let report = snapshot.to_string();
        assert!(report.contains("Holder: none"));
        assert!(report.contains("Waiters: none"));
    }
}
