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

use crate::error::DeadboltError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Process-wide response to a detected circular wait.
///
/// Fixed when the [`LockManager`](crate::locking::LockManager) is built and
/// read-only afterwards; every acquisition attempt consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadlockPolicy {
    /// Terminate the process with an abort signal so the latent deadlock is
    /// loudly visible. The default.
    #[default]
    Abort,
    /// Refuse the offending acquisition without blocking; the caller skips
    /// or retries its protected section.
    Decline,
}

impl DeadlockPolicy {
    pub fn label(self) -> &'static str {
        match self {
            DeadlockPolicy::Abort => "abort",
            DeadlockPolicy::Decline => "decline",
        }
    }
}

impl fmt::Display for DeadlockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeadlockPolicy {
    type Err = DeadboltError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "abort" => Ok(DeadlockPolicy::Abort),
            "decline" => Ok(DeadlockPolicy::Decline),
            other => Err(DeadboltError::ConfigError(format!(
                "unknown deadlock policy '{other}' (expected 'abort' or 'decline')"
            ))),
        }
    }
}
