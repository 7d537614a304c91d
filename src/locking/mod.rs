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

pub mod guard;
pub mod manager;
pub mod owner;
pub mod policy;
pub mod registry;
pub mod snapshot;
mod wait_graph;

pub use guard::LockGuard;
pub use manager::{Acquisition, LockManager};
pub use owner::OwnerId;
pub use policy::DeadlockPolicy;
pub use registry::{LockHandle, LockStats};
pub use snapshot::LockSnapshot;
