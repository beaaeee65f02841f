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

//! Connection health checks

use async_trait::async_trait;

use tether_error::Result;

use crate::connection::PoolableConnection;

/// An asynchronous health predicate over connections.
///
/// The pool calls `healthy` on the connection's bound executor, always before
/// handing an idle connection out and optionally before taking one back. A
/// check that fails with an error counts as an unhealthy verdict.
#[async_trait]
pub trait HealthCheck<C: PoolableConnection>: Send + Sync {
    async fn healthy(&self, conn: &C) -> Result<bool>;
}

/// The default [HealthCheck]: trust the transport's own liveness signal.
pub struct ActiveCheck;

#[async_trait]
impl<C: PoolableConnection> HealthCheck<C> for ActiveCheck {
    async fn healthy(&self, conn: &C) -> Result<bool> {
        Ok(conn.is_active())
    }
}
