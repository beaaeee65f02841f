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

//! The pool core: acquire, release and close orchestration

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use tether_error::{Error, ErrorType::*, Result};
use tether_runtime::current_handle;

use crate::connection::{Owner, PoolId, PoolableConnection};
use crate::handler::PoolHandler;
use crate::health::{ActiveCheck, HealthCheck};
use crate::store::{ConnectionStore, IdleDeque};

/// Per-acquire configuration handed to the [Connector].
///
/// The pool clones its config for every connect and stamps the `owner` field
/// with its own identity, marking that a successful connect belongs to it.
#[derive(Clone, Debug)]
pub struct ConnectConfig {
    /// Address of the remote peer, in whatever form the connector understands.
    pub peer: String,
    /// Cap on connection establishment, enforced by the connector.
    pub connect_timeout: Option<Duration>,
    /// The pool that will own the connection once established.
    pub owner: Option<PoolId>,
}

impl ConnectConfig {
    pub fn new(peer: impl Into<String>) -> Self {
        ConnectConfig {
            peer: peer.into(),
            connect_timeout: None,
            owner: None,
        }
    }
}

/// The connection factory.
///
/// A connector dials the peer named by the config and returns a connection
/// already bound to one executor.
#[async_trait]
pub trait Connector<C: PoolableConnection>: Send + Sync {
    async fn connect(&self, config: &ConnectConfig) -> Result<Arc<C>>;
}

/// The tunables of a [Pool].
#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    /// Health check connections on release too, not only on acquire.
    pub release_health_check: bool,
    /// Pick the most recently released idle connection first. `false` picks
    /// the least recently released one.
    pub lifo: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            release_health_check: true,
            lifo: true,
        }
    }
}

struct PoolInner<C> {
    id: PoolId,
    config: ConnectConfig,
    connector: Arc<dyn Connector<C>>,
    handler: Arc<dyn PoolHandler<C>>,
    health_check: Arc<dyn HealthCheck<C>>,
    store: Box<dyn ConnectionStore<C>>,
    release_health_check: bool,
    lifo: bool,
}

/// A pool of long-lived connections to one peer.
///
/// `acquire` hands out an idle connection that passed its health check, or
/// dials a new one when the store is empty; `release` takes a connection
/// back for reuse. Both return promptly and resolve their promise once the
/// work on the connection's bound executor is done.
///
/// No cap is imposed on the number of connections. A custom
/// [ConnectionStore] can impose one by refusing `offer_idle`, which
/// surfaces to the releasing caller as a `PoolFull` error.
pub struct Pool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
        }
    }
}

type AcquirePromise<C> = oneshot::Sender<Result<Arc<C>>>;

impl<C: PoolableConnection> Pool<C> {
    /// Create a new [Pool] with the default health check ([ActiveCheck]) and
    /// default [PoolOptions].
    pub fn new(
        config: ConnectConfig,
        connector: Arc<dyn Connector<C>>,
        handler: Arc<dyn PoolHandler<C>>,
    ) -> Self {
        Self::with_health_check(config, connector, handler, Arc::new(ActiveCheck))
    }

    /// Create a new [Pool] with the given health check.
    pub fn with_health_check(
        config: ConnectConfig,
        connector: Arc<dyn Connector<C>>,
        handler: Arc<dyn PoolHandler<C>>,
        health_check: Arc<dyn HealthCheck<C>>,
    ) -> Self {
        Self::with_options(
            config,
            connector,
            handler,
            health_check,
            PoolOptions::default(),
        )
    }

    /// Create a new [Pool] with the given health check and options.
    pub fn with_options(
        config: ConnectConfig,
        connector: Arc<dyn Connector<C>>,
        handler: Arc<dyn PoolHandler<C>>,
        health_check: Arc<dyn HealthCheck<C>>,
        options: PoolOptions,
    ) -> Self {
        let store = Box::new(IdleDeque::new(options.lifo));
        Self::with_store(config, connector, handler, health_check, store, options)
    }

    /// Create a new [Pool] over a custom [ConnectionStore].
    pub fn with_store(
        config: ConnectConfig,
        connector: Arc<dyn Connector<C>>,
        handler: Arc<dyn PoolHandler<C>>,
        health_check: Arc<dyn HealthCheck<C>>,
        store: Box<dyn ConnectionStore<C>>,
        options: PoolOptions,
    ) -> Self {
        Pool {
            inner: Arc::new(PoolInner {
                id: PoolId::next(),
                config,
                connector,
                handler,
                health_check,
                store,
                release_health_check: options.release_health_check,
                lifo: options.lifo,
            }),
        }
    }

    /// The identity of this pool, the value its leases carry in their
    /// [crate::OwnerSlot].
    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    /// Acquire a healthy connection from the pool.
    ///
    /// Dropping the returned future after a connection has been produced
    /// does not leak it: the pool takes the connection back.
    pub async fn acquire(&self) -> Result<Arc<C>> {
        let (tx, rx) = oneshot::channel();
        self.acquire_into(tx);
        match rx.await {
            Ok(result) => result,
            Err(_) => Error::e_explain(InternalError, "acquire task dropped its promise"),
        }
    }

    /// Start an acquire and complete `promise` with the outcome.
    ///
    /// Returns immediately; the orchestration runs as a task of the current
    /// runtime and trampolines to the candidate connection's bound executor.
    /// Dropping the receiving end counts as cancellation: a connection
    /// produced after that is released back to the pool, not leaked.
    ///
    /// This function will panic if called outside any runtime.
    pub fn acquire_into(&self, promise: oneshot::Sender<Result<Arc<C>>>) {
        let inner = self.inner.clone();
        current_handle().spawn(acquire_task(inner, promise));
    }

    /// Return `conn` to the pool for reuse.
    ///
    /// Fails with `MisusedRelease` when `conn` was not leased from this
    /// pool, including when it was already released once.
    pub async fn release(&self, conn: Arc<C>) -> Result<()> {
        let inner = self.inner.clone();
        let executor = conn.executor().clone();
        executor.run_on(do_release(inner, conn)).await?
    }

    /// Start returning `conn` to the pool and complete `promise` with the
    /// outcome. Returns immediately; the rest runs on `conn`'s bound
    /// executor.
    pub fn release_into(&self, conn: Arc<C>, promise: oneshot::Sender<Result<()>>) {
        let inner = self.inner.clone();
        let executor = conn.executor().clone();
        executor.spawn(async move {
            let _ = promise.send(do_release(inner, conn).await);
        });
    }

    /// Close the pool: drain the idle store and close every idle connection.
    ///
    /// Connections currently leased to callers are not affected; they are
    /// closed when their release finds no pool willing to take them, or by
    /// their owners.
    pub fn close(&self) {
        while let Some(conn) = self.inner.store.poll_idle() {
            close_connection(&*conn);
        }
        debug!("pool {}: closed", self.inner.id);
    }

    /// The number of idle connections currently stored.
    pub fn idle_len(&self) -> usize {
        self.inner.store.len()
    }

    /// The connector used to dial new connections.
    pub fn connector(&self) -> &Arc<dyn Connector<C>> {
        &self.inner.connector
    }

    /// The handler notified of pool actions.
    pub fn handler(&self) -> &Arc<dyn PoolHandler<C>> {
        &self.inner.handler
    }

    /// The health check applied to pooled connections.
    pub fn health_check(&self) -> &Arc<dyn HealthCheck<C>> {
        &self.inner.health_check
    }

    /// Whether connections are health checked on release too.
    pub fn release_health_check(&self) -> bool {
        self.inner.release_health_check
    }

    /// Whether the most recently released idle connection is picked first.
    pub fn lifo(&self) -> bool {
        self.inner.lifo
    }
}

/// Clear the ownership tag, then close. The tag is cleared first so that a
/// closed connection always reads as unowned.
fn close_connection<C: PoolableConnection>(conn: &C) {
    conn.owner().clear();
    conn.close();
}

async fn acquire_task<C: PoolableConnection>(
    inner: Arc<PoolInner<C>>,
    mut promise: AcquirePromise<C>,
) {
    loop {
        let Some(conn) = inner.store.poll_idle() else {
            // no idle connection left, dial a new one
            connect_new(inner, promise).await;
            return;
        };
        let executor = conn.executor().clone();
        let task = check_candidate(inner.clone(), conn, promise);
        match executor.run_on(task).await {
            // the promise was settled on the executor
            Ok(None) => return,
            // candidate discarded, try the next one
            Ok(Some(returned)) => promise = returned,
            Err(e) => {
                // the bound executor is gone and took the promise with it
                warn!("pool {}: lost acquire task: {}", inner.id, e);
                return;
            }
        }
    }
}

/// Health check a popped candidate on its executor. Returns the promise when
/// the candidate was discarded and the acquire should try again.
async fn check_candidate<C: PoolableConnection>(
    inner: Arc<PoolInner<C>>,
    conn: Arc<C>,
    promise: AcquirePromise<C>,
) -> Option<AcquirePromise<C>> {
    let healthy = match inner.health_check.healthy(&conn).await {
        Ok(verdict) => verdict,
        Err(e) => {
            debug!("pool {}: health check error on idle connection: {}", inner.id, e);
            false
        }
    };
    if healthy {
        hand_out(inner, conn, promise).await;
        None
    } else {
        debug!("pool {}: closing unhealthy idle connection", inner.id);
        close_connection(&*conn);
        Some(promise)
    }
}

async fn connect_new<C: PoolableConnection>(
    inner: Arc<PoolInner<C>>,
    promise: AcquirePromise<C>,
) {
    let mut config = inner.config.clone();
    config.owner = Some(inner.id);
    let conn = match inner.connector.connect(&config).await {
        Ok(conn) => conn,
        Err(e) => {
            // connect failures surface to the caller untouched
            let _ = promise.send(Err(e));
            return;
        }
    };
    debug!("pool {}: connected to {}", inner.id, config.peer);
    let executor = conn.executor().clone();
    let inner2 = inner.clone();
    let task = async move {
        if let Err(e) = inner2.handler.on_created(&conn) {
            close_connection(&*conn);
            let _ = promise.send(Err(
                Error::because(HandlerError, "on_created failed", e).into_in()
            ));
            return;
        }
        hand_out(inner2, conn, promise).await;
    };
    if let Err(e) = executor.run_on(task).await {
        warn!("pool {}: lost acquire task: {}", inner.id, e);
    }
}

/// Lease the connection out to the caller. Runs on the bound executor.
async fn hand_out<C: PoolableConnection>(
    inner: Arc<PoolInner<C>>,
    conn: Arc<C>,
    promise: AcquirePromise<C>,
) {
    conn.owner().set_leased(inner.id);
    if let Err(e) = inner.handler.on_acquired(&conn) {
        close_connection(&*conn);
        let _ = promise.send(Err(
            Error::because(HandlerError, "on_acquired failed", e).into_in()
        ));
        return;
    }
    if promise.send(Ok(conn.clone())).is_err() {
        // the caller cancelled in the meantime, put the connection back
        // instead of leaking it
        debug!("pool {}: acquire cancelled, releasing the connection", inner.id);
        if let Err(e) = do_release(inner, conn).await {
            debug!("failed to release a cancelled connection: {}", e);
        }
    }
}

/// Validate ownership and take the connection back. Runs on the bound
/// executor.
async fn do_release<C: PoolableConnection>(inner: Arc<PoolInner<C>>, conn: Arc<C>) -> Result<()> {
    // the swap is the linearization point of release validation
    let prior = conn.owner().take();
    if prior != Owner::Leased(inner.id) {
        warn!(
            "pool {}: released connection was not leased from this pool (owner: {:?})",
            inner.id, prior
        );
        close_connection(&*conn);
        return Err(Error::explain(
            MisusedRelease,
            format!(
                "connection owner was {:?}, not a lease from pool {}",
                prior, inner.id
            ),
        )
        .into_caller());
    }
    let healthy = if inner.release_health_check {
        match inner.health_check.healthy(&conn).await {
            Ok(verdict) => verdict,
            Err(e) => {
                debug!("pool {}: health check error on release: {}", inner.id, e);
                false
            }
        }
    } else {
        true
    };
    if !healthy {
        // the transport is already broken, drop the connection without
        // returning it to the store
        debug!(
            "pool {}: discarding unhealthy connection on release",
            inner.id
        );
        return finish_release(&inner, &conn);
    }
    // tag before the push so the connection never sits in the store untagged
    conn.owner().set_idle(inner.id);
    if inner.store.offer_idle(conn.clone()) {
        finish_release(&inner, &conn)
    } else {
        debug!(
            "pool {}: idle store refused the connection, closing it",
            inner.id
        );
        close_connection(&*conn);
        Err(Error::explain(PoolFull, "idle store refused the connection").into_in())
    }
}

fn finish_release<C: PoolableConnection>(inner: &Arc<PoolInner<C>>, conn: &Arc<C>) -> Result<()> {
    if let Err(e) = inner.handler.on_released(conn) {
        close_connection(&**conn);
        return Err(Error::because(HandlerError, "on_released failed", e).into_in());
    }
    Ok(())
}
