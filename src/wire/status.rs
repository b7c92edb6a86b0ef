//! Module: wire::status
//!
//! Interpretation of the gateway's error response: `[command, status, id(4)]`.
//! Only the status byte is inspected.

use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const RESPONSE_SIZE: usize = 6;

// -----------------------------------------------------------------------------
// ----- GatewayStatus ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    NoErrors,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Unknown,
}

// -----------------------------------------------------------------------------
// ----- GatewayStatus: Static -------------------------------------------------

impl GatewayStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => GatewayStatus::NoErrors,
            1 => GatewayStatus::ProcessingError,
            2 => GatewayStatus::MissingDeviceToken,
            3 => GatewayStatus::MissingTopic,
            4 => GatewayStatus::MissingPayload,
            5 => GatewayStatus::InvalidTokenSize,
            6 => GatewayStatus::InvalidTopicSize,
            7 => GatewayStatus::InvalidPayloadSize,
            8 => GatewayStatus::InvalidToken,
            255 => GatewayStatus::Unknown,
            _ => return None,
        };

        Some(status)
    }

    /// Reads a (possibly partial) error response. A response too short to
    /// carry a status byte is treated as no error.
    pub fn from_response(bytes: &[u8]) -> Result<(), StatusError> {
        let Some(&code) = bytes.get(1) else {
            return Ok(());
        };

        match Self::from_code(code) {
            Some(GatewayStatus::NoErrors) => Ok(()),
            Some(status) => Err(StatusError::Rejected(status)),
            None => Err(StatusError::Unrecognized(hex::encode(bytes))),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayStatus: Public -------------------------------------------------

impl GatewayStatus {
    pub fn code(self) -> u8 {
        match self {
            GatewayStatus::NoErrors => 0,
            GatewayStatus::ProcessingError => 1,
            GatewayStatus::MissingDeviceToken => 2,
            GatewayStatus::MissingTopic => 3,
            GatewayStatus::MissingPayload => 4,
            GatewayStatus::InvalidTokenSize => 5,
            GatewayStatus::InvalidTopicSize => 6,
            GatewayStatus::InvalidPayloadSize => 7,
            GatewayStatus::InvalidToken => 8,
            GatewayStatus::Unknown => 255,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GatewayStatus::NoErrors => "No errors encountered",
            GatewayStatus::ProcessingError => "Processing Errors",
            GatewayStatus::MissingDeviceToken => "Missing Device Token",
            GatewayStatus::MissingTopic => "Missing Topic",
            GatewayStatus::MissingPayload => "Missing Payload",
            GatewayStatus::InvalidTokenSize => "Invalid Token Size",
            GatewayStatus::InvalidTopicSize => "Invalid Topic Size",
            GatewayStatus::InvalidPayloadSize => "Invalid Payload Size",
            GatewayStatus::InvalidToken => "Invalid Token",
            GatewayStatus::Unknown => "None (Unknown)",
        }
    }
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("{0}")]
    Rejected(GatewayStatus),

    #[error("Unknown error code {0}")]
    Unrecognized(String),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
