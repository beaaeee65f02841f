// Copyright 2026 Tether Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Executor-affine connection pooling
//!
//! A [Pool] hands out healthy long-lived connections on demand, dials new
//! ones when none are idle, and takes connections back from callers for
//! reuse. Every connection is permanently bound to one single-threaded
//! executor and all pool-driven mutations of it (health checks, handler
//! callbacks, ownership changes, closes) happen there.
//!
//! Ownership is tracked with a per-connection atomic tag so that releasing a
//! connection to the wrong pool, or twice, is detected and rejected instead
//! of corrupting the idle store.

#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]

mod connection;
mod handler;
mod health;
mod pool;
mod store;

pub use connection::{Owner, OwnerSlot, PoolId, PoolableConnection};
pub use handler::{NoopHandler, PoolHandler};
pub use health::{ActiveCheck, HealthCheck};
pub use pool::{ConnectConfig, Connector, Pool, PoolOptions};
pub use store::{ConnectionStore, IdleDeque};
