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

//! Pool lifecycle callbacks

use tether_error::Result;

/// Callbacks notified on the different pool actions.
///
/// Every callback runs on the connection's bound executor. A callback
/// returning an error makes the pool close the affected connection and fail
/// the operation in flight.
pub trait PoolHandler<C>: Send + Sync {
    /// Called once per connection, right after the factory created it and
    /// before any caller observes it.
    fn on_created(&self, conn: &C) -> Result<()> {
        let _ = conn;
        Ok(())
    }

    /// Called after a connection passed its health check (or was freshly
    /// created), before the acquire completes.
    fn on_acquired(&self, conn: &C) -> Result<()> {
        let _ = conn;
        Ok(())
    }

    /// Called after a connection was returned to the idle store (or
    /// discarded as unhealthy), before the release completes.
    fn on_released(&self, conn: &C) -> Result<()> {
        let _ = conn;
        Ok(())
    }
}

/// A [PoolHandler] that does nothing.
pub struct NoopHandler;

impl<C> PoolHandler<C> for NoopHandler {}
