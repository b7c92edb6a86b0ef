use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::tls::{self, TlsError};

use super::session::GatewaySession;
use super::transport::Dialer;

// -----------------------------------------------------------------------------
// ----- SessionPool -----------------------------------------------------------

/// Fixed set of gateway sessions. Idle sessions live in `idle`; every idle
/// session is matched by exactly one available permit.
#[derive(Debug)]
pub struct SessionPool {
    endpoint: String,
    size: usize,
    idle: Mutex<VecDeque<GatewaySession>>,
    available: Arc<Semaphore>,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub idle: usize,
    pub in_use: usize,
}

// -----------------------------------------------------------------------------
// ----- SessionPool: Static ---------------------------------------------------

impl SessionPool {
    /// Builds the TLS client from the configured certificate pair, then the pool.
    pub fn from_config(config: &GatewayConfig) -> Result<Arc<Self>, PoolError> {
        if config.ca_path.is_none() {
            warn!("no apns_ca_path configured; gateway certificate will not be verified");
        }

        let connector = tls::client_connector(
            &config.cert_path,
            &config.key_path,
            config.ca_path.as_deref(),
        )?;
        let server_name = tls::server_name(&config.server)?;

        Self::init(
            config.pool_size,
            &config.server,
            Dialer::Tls {
                connector,
                server_name,
            },
        )
    }

    /// Sessions are created disconnected; each dials on its first send.
    pub fn init(size: usize, endpoint: &str, dialer: Dialer) -> Result<Arc<Self>, PoolError> {
        if size == 0 {
            return Err(PoolError::EmptyPool);
        }

        let mut idle = VecDeque::with_capacity(size);
        for id in 0..size {
            info!("starting gateway session #{id} for {endpoint}");
            idle.push_back(GatewaySession::new(id, endpoint, dialer.clone()));
        }

        Ok(Arc::new(Self {
            endpoint: endpoint.to_string(),
            size,
            idle: Mutex::new(idle),
            available: Arc::new(Semaphore::new(size)),
            closed: AtomicBool::new(false),
        }))
    }
}

// -----------------------------------------------------------------------------
// ----- SessionPool: Public ---------------------------------------------------

impl SessionPool {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        PoolStats {
            size: self.size,
            idle,
            in_use: self.size.saturating_sub(idle),
        }
    }

    /// Waits, without a timeout, until a session is idle and takes it.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession, PoolError> {
        let permit = self
            .available
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let session = self.idle.lock().pop_front().ok_or(PoolError::Closed)?;
        debug!("acquired gateway session #{}", session.id());

        Ok(PooledSession {
            pool: self.clone(),
            session: Some(session),
            permit: Some(permit),
        })
    }

    /// Waits for every checked-out session to come back, shuts each one down
    /// and closes the pool. Later `acquire` calls fail with `Closed`.
    pub async fn shutdown_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let Ok(permits) = self.available.acquire_many(self.size as u32).await else {
            return;
        };

        let sessions: Vec<_> = self.idle.lock().drain(..).collect();
        for session in &sessions {
            session.shutdown().await;
        }

        permits.forget();
        self.available.close();
        info!("closed {} gateway sessions for {}", sessions.len(), self.endpoint);
    }
}

// -----------------------------------------------------------------------------
// ----- SessionPool: Private --------------------------------------------------

impl SessionPool {
    fn push_idle(&self, session: GatewaySession, permit: OwnedSemaphorePermit) {
        debug!("released gateway session #{}", session.id());
        self.idle.lock().push_back(session);
        // permit drops after the session is visible to the next acquirer
        drop(permit);
    }
}

// -----------------------------------------------------------------------------
// ----- PooledSession ---------------------------------------------------------

/// Exclusive custody of one session. Goes back to the pool on `release` or drop.
#[derive(Debug)]
pub struct PooledSession {
    pool: Arc<SessionPool>,
    session: Option<GatewaySession>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledSession {
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledSession {
    type Target = GatewaySession;

    fn deref(&self) -> &GatewaySession {
        self.session
            .as_ref()
            .expect("pooled session used after release")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(permit) = self.permit.take() else {
            return;
        };

        self.pool.push_idle(session, permit);
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool_size must be at least 1")]
    EmptyPool,

    #[error("gateway pool closed")]
    Closed,

    #[error("gateway tls setup failed: {0}")]
    Tls(#[from] TlsError),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
