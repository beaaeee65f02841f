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

//! Connection handles and per-connection ownership tags

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tether_runtime::Executor;

/// The identity of a [crate::Pool], used as the value of ownership tags.
///
/// Ids are allocated from a process wide counter and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PoolId(u64);

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

impl PoolId {
    pub(crate) fn next() -> Self {
        PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owner a connection currently has.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Owner {
    /// Not owned by any pool. Closed connections always read as unowned.
    Unowned,
    /// Sitting in the idle store of the pool.
    Idle(PoolId),
    /// Handed out to a caller of the pool.
    Leased(PoolId),
}

const UNOWNED: u64 = 0;

fn encode(owner: Owner) -> u64 {
    match owner {
        Owner::Unowned => UNOWNED,
        Owner::Idle(PoolId(id)) => id << 1,
        Owner::Leased(PoolId(id)) => (id << 1) | 1,
    }
}

fn decode(tag: u64) -> Owner {
    if tag == UNOWNED {
        Owner::Unowned
    } else if tag & 1 == 1 {
        Owner::Leased(PoolId(tag >> 1))
    } else {
        Owner::Idle(PoolId(tag >> 1))
    }
}

/// The per-connection ownership tag.
///
/// The slot packs the owning pool identity and the idle/leased state into one
/// atomic word. The atomic swap in [OwnerSlot::take] is the linearization
/// point of release validation: the first release of a leased connection
/// observes `Leased` and wins, every other release observes something else
/// and fails.
pub struct OwnerSlot(AtomicU64);

impl OwnerSlot {
    /// A new slot, unowned.
    pub fn new() -> Self {
        OwnerSlot(AtomicU64::new(UNOWNED))
    }

    /// The current owner.
    pub fn get(&self) -> Owner {
        decode(self.0.load(Ordering::Acquire))
    }

    /// Tag the connection as idle in `pool`'s store.
    pub fn set_idle(&self, pool: PoolId) {
        self.0.store(encode(Owner::Idle(pool)), Ordering::Release);
    }

    /// Tag the connection as leased out of `pool`.
    pub fn set_leased(&self, pool: PoolId) {
        self.0.store(encode(Owner::Leased(pool)), Ordering::Release);
    }

    /// Atomically clear the tag and return the prior owner.
    pub fn take(&self) -> Owner {
        decode(self.0.swap(UNOWNED, Ordering::AcqRel))
    }

    /// Clear the tag.
    pub fn clear(&self) {
        self.0.store(UNOWNED, Ordering::Release);
    }
}

/// A connection that can be kept in a [crate::Pool].
///
/// Handles are shared as `Arc<C>`: the idle store and callers hold the same
/// underlying connection, and the [OwnerSlot] arbitrates who owns it at any
/// instant.
pub trait PoolableConnection: Send + Sync + 'static {
    /// The single-threaded executor this connection is bound to. All
    /// pool-driven mutations of the connection happen on it.
    fn executor(&self) -> &Arc<Executor>;

    /// The ownership tag of this connection.
    fn owner(&self) -> &OwnerSlot;

    /// Whether the transport still considers this connection usable.
    fn is_active(&self) -> bool;

    /// Close the transport. Must be idempotent and callable from any thread;
    /// implementations route to the bound executor as needed.
    fn close(&self);
}
