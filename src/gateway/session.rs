use std::io;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::wire::{GatewayStatus, MAX_PAYLOAD_SIZE, Notification, RESPONSE_SIZE, StatusError};

use super::transport::{Dialer, GatewayTransport};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// How long a send waits for an error response. Silence means accepted.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(150);

// -----------------------------------------------------------------------------
// ----- GatewaySession --------------------------------------------------------

/// One connection to the push gateway. Connects lazily on the first send and
/// reconnects on the send after any failure.
#[derive(Debug)]
pub struct GatewaySession {
    id: usize,
    endpoint: String,
    dialer: Dialer,
    response_timeout: Duration,
    transport: Mutex<Option<GatewayTransport>>,
}

// -----------------------------------------------------------------------------
// ----- GatewaySession: Static ------------------------------------------------

impl GatewaySession {
    pub fn new(id: usize, endpoint: impl Into<String>, dialer: Dialer) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            dialer,
            response_timeout: RESPONSE_TIMEOUT,
            transport: Mutex::new(None),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewaySession: Public ------------------------------------------------

impl GatewaySession {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    /// Dials the gateway unless already connected.
    pub async fn connect(&self) -> io::Result<()> {
        let mut transport = self.transport.lock().await;
        self.ensure_connected(&mut transport).await?;
        Ok(())
    }

    /// Writes one notification and waits `RESPONSE_TIMEOUT` for a rejection.
    /// Any failure tears the connection down.
    pub async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        if notification.payload_too_large() {
            return Err(SendError::PayloadTooLarge(notification.payload.len()));
        }

        let mut transport = self.transport.lock().await;

        let result = self.send_locked(&mut transport, notification).await;
        if result.is_err() {
            close(&mut transport).await;
        }

        result
    }

    pub async fn shutdown(&self) {
        let mut transport = self.transport.lock().await;
        close(&mut transport).await;
    }
}

// -----------------------------------------------------------------------------
// ----- GatewaySession: Private -----------------------------------------------

impl GatewaySession {
    async fn ensure_connected<'a>(
        &self,
        transport: &'a mut Option<GatewayTransport>,
    ) -> io::Result<&'a mut GatewayTransport> {
        if transport.is_none() {
            debug!("session #{} connecting to {}", self.id, self.endpoint);
            *transport = Some(self.dialer.dial(&self.endpoint).await?);
        }

        transport
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session not connected"))
    }

    async fn send_locked(
        &self,
        transport: &mut Option<GatewayTransport>,
        notification: &Notification,
    ) -> Result<(), SendError> {
        let stream = self.ensure_connected(transport).await?;

        let frame = notification
            .to_frame(SystemTime::now())
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        stream.write_all(&frame).await?;

        let mut response = [0u8; RESPONSE_SIZE];
        let n = match timeout(self.response_timeout, stream.read(&mut response)).await {
            Err(_elapsed) => {
                trace!(
                    "session #{} no response for identifier {}",
                    self.id, notification.identifier
                );
                return Ok(());
            }
            Ok(read) => read?,
        };

        if n == 0 {
            return Err(SendError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "gateway closed the connection",
            )));
        }

        GatewayStatus::from_response(&response[..n])?;
        Ok(())
    }
}

#[cfg(test)]
impl GatewaySession {
    pub(crate) fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn close(transport: &mut Option<GatewayTransport>) {
    if let Some(mut stream) = transport.take() {
        let _ = stream.shutdown().await;
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SendError {
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD_SIZE} byte limit")]
    PayloadTooLarge(usize),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error(transparent)]
    Status(#[from] StatusError),
}

impl SendError {
    /// Oversized payloads fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SendError::PayloadTooLarge(_))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
