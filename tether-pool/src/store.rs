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

//! Storage of idle connections

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Storage of connections currently owned by a pool and available for reuse.
///
/// Implementations must be safe for concurrent producers and consumers.
pub trait ConnectionStore<C>: Send + Sync {
    /// Take one idle connection out of the store, if any.
    fn poll_idle(&self) -> Option<Arc<C>>;

    /// Offer a connection back to the store. `false` means the store refuses
    /// to take it, e.g. because an implementation imposes a cap.
    fn offer_idle(&self, conn: Arc<C>) -> bool;

    /// The number of idle connections currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The default [ConnectionStore]: a deque polled LIFO or FIFO.
///
/// LIFO keeps a small working set of connections warm and lets the tail idle
/// out; FIFO cycles through every stored connection.
pub struct IdleDeque<C> {
    deque: Mutex<VecDeque<Arc<C>>>,
    lifo: bool,
}

impl<C> IdleDeque<C> {
    pub fn new(lifo: bool) -> Self {
        IdleDeque {
            deque: Mutex::new(VecDeque::new()),
            lifo,
        }
    }
}

impl<C: Send + Sync> ConnectionStore<C> for IdleDeque<C> {
    fn poll_idle(&self) -> Option<Arc<C>> {
        let mut deque = self.deque.lock();
        if self.lifo {
            deque.pop_back()
        } else {
            deque.pop_front()
        }
    }

    fn offer_idle(&self, conn: Arc<C>) -> bool {
        self.deque.lock().push_back(conn);
        true
    }

    fn len(&self) -> usize {
        self.deque.lock().len()
    }
}
