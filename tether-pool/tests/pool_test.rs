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

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;

use tether_error::{Error, ErrorType, Result};
use tether_pool::{
    ConnectConfig, ConnectionStore, Connector, HealthCheck, Owner, OwnerSlot, Pool, PoolHandler,
    PoolOptions, PoolableConnection,
};
use tether_runtime::{Executor, ExecutorPool};

struct TestConnection {
    id: usize,
    executor: Arc<Executor>,
    owner: OwnerSlot,
    active: AtomicBool,
    closed: AtomicBool,
}

impl TestConnection {
    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TestConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestConnection")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("closed", &self.closed)
            .finish()
    }
}

impl PoolableConnection for TestConnection {
    fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    fn owner(&self) -> &OwnerSlot {
        &self.owner
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct TestConnector {
    executors: Arc<ExecutorPool>,
    calls: AtomicUsize,
    next_id: AtomicUsize,
    delay_ms: AtomicU64,
    fail: AtomicBool,
}

impl TestConnector {
    fn new(executors: Arc<ExecutorPool>) -> Self {
        TestConnector {
            executors,
            calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            delay_ms: AtomicU64::new(0),
            fail: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector<TestConnection> for TestConnector {
    async fn connect(&self, config: &ConnectConfig) -> Result<Arc<TestConnection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Error::e_explain(
                ErrorType::ConnectError,
                format!("dialing {} failed", config.peer),
            );
        }
        Ok(Arc::new(TestConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            executor: self.executors.get().clone(),
            owner: OwnerSlot::new(),
            active: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Default)]
struct TestHandler {
    created: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    fail_acquired: AtomicBool,
    // callbacks observed off the connection's bound executor
    off_executor: AtomicUsize,
}

impl TestHandler {
    fn record(&self, conn: &TestConnection, counter: &AtomicUsize) {
        if !conn.executor().is_current() {
            self.off_executor.fetch_add(1, Ordering::SeqCst);
        }
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn counts(&self) -> (usize, usize, usize) {
        (
            self.created.load(Ordering::SeqCst),
            self.acquired.load(Ordering::SeqCst),
            self.released.load(Ordering::SeqCst),
        )
    }
}

impl PoolHandler<TestConnection> for TestHandler {
    fn on_created(&self, conn: &TestConnection) -> Result<()> {
        self.record(conn, &self.created);
        Ok(())
    }

    fn on_acquired(&self, conn: &TestConnection) -> Result<()> {
        if self.fail_acquired.load(Ordering::SeqCst) {
            return Error::e_explain(ErrorType::InternalError, "refused in on_acquired");
        }
        self.record(conn, &self.acquired);
        Ok(())
    }

    fn on_released(&self, conn: &TestConnection) -> Result<()> {
        self.record(conn, &self.released);
        Ok(())
    }
}

/// Health check with scripted verdicts; falls back to `is_active` when the
/// script runs dry.
#[derive(Default)]
struct TestCheck {
    verdicts: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
    off_executor: AtomicUsize,
}

impl TestCheck {
    fn script(&self, verdicts: impl IntoIterator<Item = bool>) {
        self.verdicts.lock().extend(verdicts);
    }
}

#[async_trait]
impl HealthCheck<TestConnection> for TestCheck {
    async fn healthy(&self, conn: &TestConnection) -> Result<bool> {
        if !conn.executor().is_current() {
            self.off_executor.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.verdicts.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| conn.is_active()))
    }
}

struct TestRig {
    // keeps the executor threads alive for the duration of the test
    _executors: Arc<ExecutorPool>,
    connector: Arc<TestConnector>,
    handler: Arc<TestHandler>,
    check: Arc<TestCheck>,
}

impl TestRig {
    fn new() -> Self {
        let executors = Arc::new(ExecutorPool::new(2, "pool-test"));
        TestRig {
            connector: Arc::new(TestConnector::new(executors.clone())),
            handler: Arc::new(TestHandler::default()),
            check: Arc::new(TestCheck::default()),
            _executors: executors,
        }
    }

    fn pool(&self, options: PoolOptions) -> Pool<TestConnection> {
        Pool::with_options(
            ConnectConfig::new("mock:7000"),
            self.connector.clone(),
            self.handler.clone(),
            self.check.clone(),
            options,
        )
    }
}

fn no_release_check() -> PoolOptions {
    PoolOptions {
        release_health_check: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_warm_reuse() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let c1 = pool.acquire().await.unwrap();
    assert_eq!(rig.connector.calls(), 1);
    pool.release(c1.clone()).await.unwrap();
    assert_eq!(pool.idle_len(), 1);

    let c2 = pool.acquire().await.unwrap();
    assert!(Arc::ptr_eq(&c1, &c2));
    // reuse does not dial again
    assert_eq!(rig.connector.calls(), 1);
    pool.release(c2).await.unwrap();

    assert_eq!(rig.handler.counts(), (1, 2, 2));
    assert_eq!(rig.handler.off_executor.load(Ordering::SeqCst), 0);
    assert_eq!(rig.check.off_executor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unhealthy_retry() {
    let rig = TestRig::new();
    let pool = rig.pool(no_release_check());

    let c1 = pool.acquire().await.unwrap();
    let c2 = pool.acquire().await.unwrap();
    pool.release(c1.clone()).await.unwrap();
    pool.release(c2.clone()).await.unwrap();
    assert_eq!(pool.idle_len(), 2);

    // lifo: c2 is popped first and found broken, c1 is the fallback
    rig.check.script([false, true]);
    let got = pool.acquire().await.unwrap();
    assert!(Arc::ptr_eq(&got, &c1));
    assert!(c2.closed());
    assert_eq!(c2.owner().get(), Owner::Unowned);
    assert_eq!(rig.connector.calls(), 2);
    assert_eq!(pool.idle_len(), 0);
}

#[tokio::test]
async fn test_drained_store_falls_through_to_connect() {
    let rig = TestRig::new();
    let pool = rig.pool(no_release_check());

    let c1 = pool.acquire().await.unwrap();
    pool.release(c1.clone()).await.unwrap();

    // the only idle connection is broken, a fresh one is dialed
    rig.check.script([false]);
    let got = pool.acquire().await.unwrap();
    assert!(!Arc::ptr_eq(&got, &c1));
    assert!(c1.closed());
    assert_eq!(rig.connector.calls(), 2);
}

#[tokio::test]
async fn test_cross_pool_misuse() {
    let rig = TestRig::new();
    let pool_a = rig.pool(PoolOptions::default());
    let pool_b = rig.pool(PoolOptions::default());

    let conn = pool_a.acquire().await.unwrap();
    let err = pool_b.release(conn.clone()).await.unwrap_err();
    assert_eq!(err.etype(), &ErrorType::MisusedRelease);
    assert!(conn.closed());
    assert_eq!(conn.owner().get(), Owner::Unowned);
    assert_eq!(pool_a.idle_len(), 0);
    assert_eq!(pool_b.idle_len(), 0);
}

#[tokio::test]
async fn test_double_release() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let conn = pool.acquire().await.unwrap();
    pool.release(conn.clone()).await.unwrap();
    // the first release cleared the lease, the second must not pass
    let err = pool.release(conn.clone()).await.unwrap_err();
    assert_eq!(err.etype(), &ErrorType::MisusedRelease);
    assert!(conn.closed());

    // the closed connection left in the store is weeded out by the next
    // acquire instead of being handed to a caller
    let got = pool.acquire().await.unwrap();
    assert!(!Arc::ptr_eq(&got, &conn));
    assert_eq!(rig.connector.calls(), 2);
}

#[tokio::test]
async fn test_cancelled_acquire_releases_the_connection() {
    let rig = TestRig::new();
    rig.connector.delay_ms.store(50, Ordering::SeqCst);
    let pool = rig.pool(PoolOptions::default());

    let (tx, rx) = oneshot::channel();
    pool.acquire_into(tx);
    // cancel before the connect completes
    drop(rx);
    sleep(Duration::from_millis(300)).await;

    assert_eq!(pool.idle_len(), 1);
    assert_eq!(rig.handler.counts(), (1, 1, 1));

    // the returned connection is reusable
    rig.connector.delay_ms.store(0, Ordering::SeqCst);
    let conn = pool.acquire().await.unwrap();
    assert!(!conn.closed());
    assert_eq!(rig.connector.calls(), 1);
}

/// A store that refuses every connection offered back.
struct RejectStore;

impl ConnectionStore<TestConnection> for RejectStore {
    fn poll_idle(&self) -> Option<Arc<TestConnection>> {
        None
    }

    fn offer_idle(&self, _conn: Arc<TestConnection>) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_release_when_full() {
    let rig = TestRig::new();
    let pool = Pool::with_store(
        ConnectConfig::new("mock:7000"),
        rig.connector.clone(),
        rig.handler.clone(),
        rig.check.clone(),
        Box::new(RejectStore),
        PoolOptions::default(),
    );

    let conn = pool.acquire().await.unwrap();
    let err = pool.release(conn.clone()).await.unwrap_err();
    assert_eq!(err.etype(), &ErrorType::PoolFull);
    assert!(conn.closed());
    assert_eq!(conn.owner().get(), Owner::Unowned);
}

#[tokio::test]
async fn test_lifo_selection() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let c = pool.acquire().await.unwrap();
    pool.release(a.clone()).await.unwrap();
    pool.release(b.clone()).await.unwrap();
    pool.release(c.clone()).await.unwrap();

    let got = pool.acquire().await.unwrap();
    assert!(Arc::ptr_eq(&got, &c));
}

#[tokio::test]
async fn test_fifo_selection() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions {
        lifo: false,
        ..Default::default()
    });

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let c = pool.acquire().await.unwrap();
    pool.release(a.clone()).await.unwrap();
    pool.release(b.clone()).await.unwrap();
    pool.release(c.clone()).await.unwrap();

    let got = pool.acquire().await.unwrap();
    assert!(Arc::ptr_eq(&got, &a));
}

#[tokio::test]
async fn test_connect_failure_surfaces() {
    let rig = TestRig::new();
    rig.connector.fail.store(true, Ordering::SeqCst);
    let pool = rig.pool(PoolOptions::default());

    let err = pool.acquire().await.unwrap_err();
    assert_eq!(err.etype(), &ErrorType::ConnectError);
    assert_eq!(rig.handler.counts(), (0, 0, 0));
}

#[tokio::test]
async fn test_handler_error_closes_and_fails() {
    let rig = TestRig::new();
    rig.handler.fail_acquired.store(true, Ordering::SeqCst);
    let pool = rig.pool(PoolOptions::default());

    let err = pool.acquire().await.unwrap_err();
    assert_eq!(err.etype(), &ErrorType::HandlerError);
    assert_eq!(pool.idle_len(), 0);
}

#[tokio::test]
async fn test_unhealthy_release_discards_without_close() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let conn = pool.acquire().await.unwrap();
    // break the transport while the caller holds the connection
    conn.active.store(false, Ordering::SeqCst);
    pool.release(conn.clone()).await.unwrap();

    // discarded, not stored, and not explicitly closed
    assert_eq!(pool.idle_len(), 0);
    assert!(!conn.closed());
    assert_eq!(conn.owner().get(), Owner::Unowned);
    assert_eq!(rig.handler.counts(), (1, 1, 1));
}

#[tokio::test]
async fn test_close_drains_idle_connections() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    pool.release(a.clone()).await.unwrap();
    pool.release(b.clone()).await.unwrap();
    assert_eq!(pool.idle_len(), 2);

    pool.close();
    assert_eq!(pool.idle_len(), 0);
    assert!(a.closed() && b.closed());
    assert_eq!(a.owner().get(), Owner::Unowned);
    assert_eq!(b.owner().get(), Owner::Unowned);
}

#[tokio::test]
async fn test_owner_tag_states() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.owner().get(), Owner::Leased(pool.id()));

    pool.release(conn.clone()).await.unwrap();
    assert_eq!(conn.owner().get(), Owner::Idle(pool.id()));

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.owner().get(), Owner::Leased(pool.id()));
    pool.release(conn).await.unwrap();

    pool.close();
}

#[tokio::test]
async fn test_release_into() {
    let rig = TestRig::new();
    let pool = rig.pool(PoolOptions::default());

    let conn = pool.acquire().await.unwrap();
    let (tx, rx) = oneshot::channel();
    pool.release_into(conn.clone(), tx);
    rx.await.unwrap().unwrap();
    assert_eq!(pool.idle_len(), 1);
}

#[tokio::test]
async fn test_distinct_ids() {
    let rig = TestRig::new();
    let pool = rig.pool(no_release_check());

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id, b.id);
}
