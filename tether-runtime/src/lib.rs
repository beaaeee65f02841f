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

//! Tether tokio runtime.
//!
//! This crate provides a multi-threaded runtime without work stealing, backed
//! by a pool of single-threaded tokio runtimes. Work submitted to one
//! [Executor] of the pool always runs on the same OS thread, which is what
//! connection-affine code needs: a connection is bound to one [Executor] for
//! its entire lifetime and every mutation of it happens there.
//!
//! Unlike a work-stealing runtime, an [Executor] can tell whether the calling
//! thread is its own backing thread, so callers can run work inline when they
//! are already in the right place and submit it otherwise.

#![warn(clippy::all)]

use once_cell::sync::{Lazy, OnceCell};
use rand::Rng;
use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use thread_local::ThreadLocal;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot::{channel, Sender};

use tether_error::{ErrorType::*, OrErr, Result};

/// A handle to one single-threaded executor of an [ExecutorPool].
///
/// The executor is permanently backed by one OS thread. Cloning the handle is
/// cheap; all clones refer to the same thread.
pub struct Executor {
    handle: Handle,
    thread: ThreadId,
    index: usize,
}

impl Executor {
    /// The tokio [Handle] of this executor's runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The position of this executor in its [ExecutorPool].
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the calling thread is the thread backing this executor.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread
    }

    /// Submit a task to this executor.
    pub fn spawn<F>(&self, task: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(task)
    }

    /// Run `task` on this executor: inline when the caller is already on its
    /// backing thread, otherwise submitted and awaited.
    ///
    /// Returns `InternalError` when the executor is shut down before the task
    /// finishes.
    pub async fn run_on<F>(&self, task: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_current() {
            Ok(task.await)
        } else {
            self.handle
                .spawn(task)
                .await
                .or_err(InternalError, "executor failure")
        }
    }
}

// only ExecutorPool threads set this thread local
static CURRENT_EXECUTORS: Lazy<ThreadLocal<Executors>> = Lazy::new(ThreadLocal::new);

/// Return the [Handle] of current runtime.
/// If the current thread belongs to an [ExecutorPool], the [Handle] of a
/// random executor of that pool is returned. This function will panic if
/// called outside any runtime.
pub fn current_handle() -> Handle {
    if let Some(executors) = CURRENT_EXECUTORS.get() {
        // safety: CURRENT_EXECUTORS is set when the pool is being initialized
        // in init_executors()
        let executors = executors.get().unwrap();
        let mut rng = rand::thread_rng();
        let index = rng.gen_range(0..executors.len());
        executors[index].handle().clone()
    } else {
        // not an ExecutorPool thread, just check the current tokio runtime
        Handle::current()
    }
}

type Control = (Sender<Duration>, JoinHandle<()>);
type Executors = Arc<OnceCell<Box<[Arc<Executor>]>>>;

/// A pool of single-threaded executors.
///
/// Each executor is a current-thread tokio runtime on its own dedicated
/// thread. Tasks never move between executors.
pub struct ExecutorPool {
    threads: usize,
    name: String,
    // Lazily init the executors so that they are created after the process
    // finishes daemonizing itself. Otherwise the runtime threads are lost.
    executors: Executors,
    controls: OnceCell<Vec<Control>>,
}

impl ExecutorPool {
    /// Create a new [ExecutorPool]. Panic if `threads` is 0
    pub fn new(threads: usize, name: &str) -> Self {
        assert!(threads != 0);
        ExecutorPool {
            threads,
            name: name.to_string(),
            executors: Arc::new(OnceCell::new()),
            controls: OnceCell::new(),
        }
    }

    fn init_executors(&self) -> (Box<[Arc<Executor>]>, Vec<Control>) {
        let mut executors = Vec::with_capacity(self.threads);
        let mut controls = Vec::with_capacity(self.threads);
        for index in 0..self.threads {
            // the runtime is built on its own thread so that the thread id of
            // the backing thread can be captured alongside the handle
            let (meta_tx, meta_rx) = mpsc::sync_channel::<(Handle, ThreadId)>(1);
            let (tx, rx) = channel::<Duration>();
            let executors_ref = self.executors.clone();
            let join = std::thread::Builder::new()
                .name(format!("{}-{}", self.name, index))
                .spawn(move || {
                    let rt = Builder::new_current_thread().enable_all().build().unwrap();
                    let _ = meta_tx.send((rt.handle().clone(), std::thread::current().id()));
                    CURRENT_EXECUTORS.get_or(|| executors_ref);
                    if let Ok(timeout) = rt.block_on(rx) {
                        rt.shutdown_timeout(timeout);
                    } // else Err(_): tx is dropped, just exit
                })
                .unwrap();
            // the send happens before the thread parks in block_on
            let (handle, thread) = meta_rx.recv().unwrap();
            executors.push(Arc::new(Executor {
                handle,
                thread,
                index,
            }));
            controls.push((tx, join));
        }

        (executors.into_boxed_slice(), controls)
    }

    fn get_executors(&self) -> &[Arc<Executor>] {
        if let Some(e) = self.executors.get() {
            e
        } else {
            let (executors, controls) = self.init_executors();
            // there could be another thread racing with this one to init the executors
            match self.executors.try_insert(executors) {
                Ok(e) => {
                    // unwrap to make sure that this is the one that init both executors and controls
                    self.controls.set(controls).unwrap();
                    e
                }
                // another thread already set it, just return it
                Err((e, _my_executors)) => e,
            }
        }
    }

    /// Return a random [Executor] of this pool
    pub fn get(&self) -> &Arc<Executor> {
        let mut rng = rand::thread_rng();
        let index = rng.gen_range(0..self.threads);
        self.get_at(index)
    }

    /// Return the [Executor] at the given position of this pool
    pub fn get_at(&self, index: usize) -> &Arc<Executor> {
        &self.get_executors()[index]
    }

    /// Return the number of threads of this pool
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Call tokio's `shutdown_timeout` of all the runtimes. This function is blocking until
    /// all runtimes exit.
    pub fn shutdown_timeout(mut self, timeout: Duration) {
        if let Some(controls) = self.controls.take() {
            let (txs, joins): (Vec<Sender<_>>, Vec<JoinHandle<()>>) = controls.into_iter().unzip();
            for tx in txs {
                let _ = tx.send(timeout); // Err() when rx is dropped
            }
            for join in joins {
                let _ = join.join(); // ignore thread error
            }
        } // else, the controls and the runtimes are not even init yet, just return;
    }
}
