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

//! # Tether
//!
//! Tether keeps long-lived network connections around for reuse. The heart of
//! it is an asynchronous, thread-safe connection pool in which every
//! connection stays bound to one single-threaded executor for its entire
//! life, plus the small amount of HTTP plumbing (chunked body streaming)
//! the surrounding transport needs.
//!
//! # Crates
//! - [`pool`]: the connection pool core
//! - [`runtime`]: pools of single-threaded tokio executors
//! - [`http`]: HTTP body chunk objects and the chunked body stream
//! - [`error`]: the error type shared by all of the above

#![warn(clippy::all)]

pub use tether_error as error;
pub use tether_http as http;
pub use tether_pool as pool;
pub use tether_runtime as runtime;

pub mod prelude {
    pub use tether_error::{ErrorType, Result};
    pub use tether_http::{ChunkedInput, HttpChunkedStream, HttpContent};
    pub use tether_pool::{ConnectConfig, Connector, HealthCheck, Pool, PoolHandler};
    pub use tether_runtime::{Executor, ExecutorPool};
}
