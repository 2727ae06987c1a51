//! Session pool management.
//!
//! A bounded pool of authenticated backend sessions shared by every tool call.
//!
//! # Design Decisions
//!
//! - **FIFO `Semaphore` for capacity**: one permit per checked-out session. Tokio's
//!   semaphore is fair, so requests queued on exhaustion are served in arrival order
//! - **`std::sync::Mutex` for pool state**: the idle list and counters are only touched
//!   in short synchronous sections and never held across an await point
//! - **`PooledSession` guard**: a session leaves the pool inside a guard that owns the
//!   permit; releasing it (or dropping it) is the only way capacity comes back
//! - **`Notify` for draining**: shutdown waits for in-use sessions to come back
//!
//! # Lifecycle
//!
//! Created -> Idle <-> CheckedOut -> Closed. A checked-out session is closed when it is
//! released as unhealthy, dropped without release, or returned after shutdown. Idle
//! sessions are only closed by shutdown.

use crate::config::{Config, DEFAULT_RETRY_BACKOFF_MS};
use crate::db::backend::{BackendSession, Connector, DataSet};
use crate::error::{DbError, DbResult};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, info, warn};

/// Upper bound for the exponential backoff between connection attempts.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_size: usize,
    pub wait_timeout: Duration,
    pub max_retry: u32,
    pub retry_backoff: Duration,
}

impl PoolOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_size: config.pool_size,
            wait_timeout: config.wait_timeout_duration(),
            max_retry: config.max_retry,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub idle: usize,
    pub checked_out: usize,
    pub max_size: usize,
    pub closed: bool,
}

struct IdleSession {
    id: u64,
    session: Box<dyn BackendSession>,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<IdleSession>,
    checked_out: usize,
    closed: bool,
}

struct PoolInner {
    connector: Arc<dyn Connector>,
    options: PoolOptions,
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
    drained: Notify,
    next_id: AtomicU64,
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give a checked-out slot back. Returns the session when it must be closed.
    fn check_in(
        &self,
        id: u64,
        session: Box<dyn BackendSession>,
        healthy: bool,
    ) -> Option<Box<dyn BackendSession>> {
        let to_close = {
            let mut state = self.state();
            state.checked_out = state.checked_out.saturating_sub(1);
            if healthy && !state.closed {
                state.idle.push_back(IdleSession { id, session });
                None
            } else {
                Some(session)
            }
        }; // Lock released here
        self.drained.notify_waiters();
        to_close
    }
}

/// Bounded pool of backend sessions. Cheap to clone.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("backend", &self.inner.connector.name())
            .field("status", &self.status())
            .finish()
    }
}

impl SessionPool {
    pub fn new(connector: Arc<dyn Connector>, options: PoolOptions) -> Self {
        info!(
            backend = connector.name(),
            max_size = options.max_size,
            wait_timeout_ms = options.wait_timeout.as_millis() as u64,
            "Session pool created"
        );
        Self {
            inner: Arc::new(PoolInner {
                connector,
                semaphore: Arc::new(Semaphore::new(options.max_size)),
                options,
                state: Mutex::new(PoolState::default()),
                drained: Notify::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Check out a session, reusing an idle one when possible.
    ///
    /// Waits up to the configured wait timeout for capacity. Fails with
    /// `PoolExhausted` when none frees up, `PoolClosed` after shutdown and
    /// `Connection` when a new session cannot be opened.
    pub async fn acquire(&self) -> DbResult<PooledSession> {
        let inner = &self.inner;
        if inner.state().closed {
            return Err(DbError::PoolClosed);
        }

        let wait = inner.options.wait_timeout;
        let permit = match timeout(wait, Arc::clone(&inner.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            // Semaphore closed by shutdown
            Ok(Err(_)) => return Err(DbError::PoolClosed),
            Err(_) => {
                warn!(
                    waited_ms = wait.as_millis() as u64,
                    max_size = inner.options.max_size,
                    "Session pool exhausted"
                );
                return Err(DbError::pool_exhausted(
                    wait.as_millis() as u64,
                    inner.options.max_size,
                ));
            }
        };

        let idle = {
            let mut state = inner.state();
            if state.closed {
                return Err(DbError::PoolClosed);
            }
            state.checked_out += 1;
            state.idle.pop_front()
        }; // Lock released here

        let (id, session) = match idle {
            Some(IdleSession { id, session }) => {
                debug!(session_id = id, "Reusing idle session");
                (id, session)
            }
            None => match self.open_session().await {
                Ok(session) => {
                    let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                    info!(session_id = id, backend = inner.connector.name(), "Opened session");
                    (id, session)
                }
                Err(e) => {
                    {
                        let mut state = inner.state();
                        state.checked_out = state.checked_out.saturating_sub(1);
                    }
                    inner.drained.notify_waiters();
                    return Err(e);
                }
            },
        };

        Ok(PooledSession {
            checkout: Some(Checkout {
                id,
                session,
                _permit: permit,
            }),
            pool: Arc::clone(inner),
        })
    }

    /// Return a session. Healthy sessions go back to the idle list; unhealthy ones are closed.
    pub async fn release(&self, session: PooledSession, healthy: bool) {
        session.release(healthy).await;
    }

    /// Close the pool.
    ///
    /// Refuses new acquisitions, wakes queued waiters with `PoolClosed`, closes idle
    /// sessions and waits up to the wait timeout for checked-out sessions to return.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let idle = {
            let mut state = inner.state();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        inner.semaphore.close();

        info!(idle = idle.len(), "Shutting down session pool");
        for IdleSession { id, session } in idle {
            session.close().await;
            debug!(session_id = id, "Closed idle session");
        }

        let deadline = Instant::now() + inner.options.wait_timeout;
        loop {
            let notified = inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let checked_out = inner.state().checked_out;
            if checked_out == 0 {
                break;
            }
            if timeout_at(deadline, notified).await.is_err() {
                warn!(
                    checked_out = checked_out,
                    "Timed out waiting for sessions to be returned"
                );
                break;
            }
        }
        info!("Session pool closed");
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state();
        PoolStatus {
            idle: state.idle.len(),
            checked_out: state.checked_out,
            max_size: self.inner.options.max_size,
            closed: state.closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }

    /// Open a new session, retrying with exponential backoff.
    async fn open_session(&self) -> DbResult<Box<dyn BackendSession>> {
        let inner = &self.inner;
        let mut backoff = inner.options.retry_backoff;
        let mut attempt: u32 = 0;
        loop {
            match inner.connector.connect().await {
                Ok(session) => return Ok(session),
                Err(e) if attempt < inner.options.max_retry => {
                    attempt += 1;
                    warn!(
                        attempt = attempt,
                        max_retry = inner.options.max_retry,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Failed to open session, retrying"
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
                Err(e) => {
                    warn!(attempts = attempt + 1, error = %e, "Giving up opening session");
                    return Err(match e {
                        DbError::Connection { .. } => e,
                        other => DbError::connection(
                            other.to_string(),
                            "Check that IoTDB is running and the REST service is enabled",
                        ),
                    });
                }
            }
        }
    }
}

struct Checkout {
    id: u64,
    session: Box<dyn BackendSession>,
    _permit: OwnedSemaphorePermit,
}

/// A session checked out of the pool.
///
/// Release it with [`SessionPool::release`]. Dropping it without a release counts
/// as unhealthy: the session is closed and its capacity returned.
pub struct PooledSession {
    checkout: Option<Checkout>,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("id", &self.checkout.as_ref().map(|c| c.id))
            .finish()
    }
}

impl PooledSession {
    pub fn id(&self) -> Option<u64> {
        self.checkout.as_ref().map(|c| c.id)
    }

    /// Execute a statement on the underlying session.
    pub async fn execute_query(
        &mut self,
        sql: &str,
        fetch_size: usize,
    ) -> DbResult<Box<dyn DataSet>> {
        let checkout = self
            .checkout
            .as_mut()
            .ok_or_else(|| DbError::internal("Session already released"))?;
        checkout.session.execute_query(sql, fetch_size).await
    }

    async fn release(mut self, healthy: bool) {
        let Some(Checkout {
            id,
            session,
            _permit: permit,
        }) = self.checkout.take()
        else {
            return;
        };
        // Capacity comes back only once the session is in the idle list.
        let to_close = self.pool.check_in(id, session, healthy);
        drop(permit);
        match to_close {
            None => debug!(session_id = id, "Session returned to pool"),
            Some(session) => {
                if healthy {
                    debug!(session_id = id, "Pool closed, closing returned session");
                } else {
                    warn!(session_id = id, "Discarding unhealthy session");
                }
                session.close().await;
            }
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let Some(Checkout {
            id,
            session,
            _permit,
        }) = self.checkout.take()
        else {
            return;
        };
        warn!(session_id = id, "Session dropped without release, closing it");
        if let Some(session) = self.pool.check_in(id, session, false) {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(session.close());
                }
                Err(_) => {
                    warn!(session_id = id, "No tokio runtime, session dropped without close");
                }
            }
        }
    }
}
