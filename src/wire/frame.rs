//! Module: wire::frame
//!
//! Encoding and decoding of the "command 1" push frame.
//!
//! Layout (big-endian):
//!   u8   command (always 1)
//!   u32  transaction identifier
//!   u32  expiration (absolute UTC epoch seconds)
//!   u16  token length,   token bytes
//!   u16  payload length, payload bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const COMMAND: u8 = 1;
pub const MAX_PAYLOAD_SIZE: usize = 256;
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(7200);

const HEADER_SIZE: usize = 1 + 4 + 4;

// -----------------------------------------------------------------------------
// ----- Notification ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub token: Bytes,
    pub identifier: u32,
    pub expiry: Duration,
    pub payload: Bytes,
}

impl Notification {
    pub fn new(token: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            token: token.into(),
            identifier: 0,
            expiry: DEFAULT_EXPIRY,
            payload: payload.into(),
        }
    }

    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn payload_too_large(&self) -> bool {
        self.payload.len() > MAX_PAYLOAD_SIZE
    }

    /// Builds the frame for this notification with the expiry anchored at `now`.
    /// Expirations past the end of the u32 epoch clamp to `u32::MAX`.
    pub fn to_frame(&self, now: SystemTime) -> NotificationFrame {
        let since_epoch = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .saturating_add(self.expiry);

        NotificationFrame {
            identifier: self.identifier,
            expiration: u32::try_from(since_epoch.as_secs()).unwrap_or(u32::MAX),
            token: self.token.clone(),
            payload: self.payload.clone(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- NotificationFrame -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFrame {
    pub identifier: u32,
    pub expiration: u32,
    pub token: Bytes,
    pub payload: Bytes,
}

// -----------------------------------------------------------------------------
// ----- NotificationFrame: Static ---------------------------------------------

impl NotificationFrame {
    pub fn from_bytes(bytes: Bytes) -> Result<Self, FrameError> {
        let mut buf = bytes;

        if buf.remaining() < HEADER_SIZE + 2 {
            return Err(FrameError::Truncated);
        }

        let command = buf.get_u8();
        if command != COMMAND {
            return Err(FrameError::UnexpectedCommand(command));
        }

        let identifier = buf.get_u32();
        let expiration = buf.get_u32();
        let token = take_sized(&mut buf)?;
        let payload = take_sized(&mut buf)?;

        if buf.has_remaining() {
            return Err(FrameError::TrailingBytes(buf.remaining()));
        }

        Ok(Self {
            identifier,
            expiration,
            token,
            payload,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- NotificationFrame: Public ---------------------------------------------

impl NotificationFrame {
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        let token_len =
            u16::try_from(self.token.len()).map_err(|_| FrameError::Oversized("token"))?;
        let payload_len =
            u16::try_from(self.payload.len()).map_err(|_| FrameError::Oversized("payload"))?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(COMMAND);
        buf.put_u32(self.identifier);
        buf.put_u32(self.expiration);
        buf.put_u16(token_len);
        buf.extend_from_slice(&self.token);
        buf.put_u16(payload_len);
        buf.extend_from_slice(&self.payload);

        Ok(buf.freeze())
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + 2 + self.token.len() + 2 + self.payload.len()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn take_sized(buf: &mut Bytes) -> Result<Bytes, FrameError> {
    if buf.remaining() < 2 {
        return Err(FrameError::Truncated);
    }

    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(FrameError::Truncated);
    }

    Ok(buf.split_to(len))
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated")]
    Truncated,

    #[error("unexpected command byte: {0}")]
    UnexpectedCommand(u8),

    #[error("{0} bytes left after payload")]
    TrailingBytes(usize),

    #[error("{0} does not fit a u16 length prefix")]
    Oversized(&'static str),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
