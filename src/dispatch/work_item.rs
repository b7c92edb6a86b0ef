//! Module: dispatch::work_item
//!
//! Strict parsing of queue records:
//!
//! ```json
//! {"token": "<hex>", "identifier": 9, "expiry": 3600, "data": {...}}
//! ```
//!
//! `token` and `data` are required; `identifier` defaults to 0 and `expiry`
//! (seconds) to 7200. The parsed record is kept so a failed item can be
//! requeued with its retry counter.

use bytes::Bytes;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::wire::{DEFAULT_EXPIRY, Notification};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Hidden field counting failed deliveries of a requeued record.
pub const RETRY_FIELD: &str = "_pushcrab_retries";

// -----------------------------------------------------------------------------
// ----- WorkItem --------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub notification: Notification,
    retries: Option<u32>,
    record: Map<String, Value>,
}

// -----------------------------------------------------------------------------
// ----- WorkItem: Static ------------------------------------------------------

impl WorkItem {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(raw).map_err(ParseError::InvalidJson)?;
        let Value::Object(record) = value else {
            return Err(ParseError::NotAnObject);
        };

        let token = match record.get("token") {
            Some(Value::String(hex_token)) => hex::decode(hex_token)?,
            Some(_) => return Err(ParseError::InvalidField("token")),
            None => return Err(ParseError::MissingToken),
        };

        let identifier = match record.get("identifier") {
            Some(value) => as_u32(value).ok_or(ParseError::InvalidField("identifier"))?,
            None => 0,
        };

        let expiry = match record.get("expiry") {
            Some(value) => {
                let secs = as_u32(value).ok_or(ParseError::InvalidField("expiry"))?;
                Duration::from_secs(secs.into())
            }
            None => DEFAULT_EXPIRY,
        };

        let payload = match record.get("data") {
            Some(data @ Value::Object(_)) => Bytes::from(data.to_string()),
            Some(_) => return Err(ParseError::InvalidField("data")),
            None => return Err(ParseError::MissingData),
        };

        let retries = match record.get(RETRY_FIELD) {
            Some(value) => Some(as_u32(value).ok_or(ParseError::InvalidField(RETRY_FIELD))?),
            None => None,
        };

        let notification = Notification::new(token, payload)
            .with_identifier(identifier)
            .with_expiry(expiry);

        Ok(Self {
            notification,
            retries,
            record,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- WorkItem: Public ------------------------------------------------------

impl WorkItem {
    pub fn identifier(&self) -> u32 {
        self.notification.identifier
    }

    /// Failed deliveries recorded on this item; `None` on its first attempt.
    pub fn retries(&self) -> Option<u32> {
        self.retries
    }

    /// The original record with the retry counter set to `retries`.
    pub fn to_requeue(&self, retries: u32) -> String {
        let mut record = self.record.clone();
        record.insert(RETRY_FIELD.to_string(), Value::from(retries));
        Value::Object(record).to_string()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// JSON producers often emit integral numbers as floats.
fn as_u32(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }

    let f = value.as_f64()?;
    if f.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&f) {
        Some(f as u32)
    } else {
        None
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("invalid json: {0}")]
    InvalidJson(serde_json::Error),

    #[error("record is not a json object")]
    NotAnObject,

    #[error("token was missing")]
    MissingToken,

    #[error("token is not valid hex: {0}")]
    InvalidToken(#[from] hex::FromHexError),

    #[error("data structure was missing")]
    MissingData,

    #[error("invalid '{0}' field")]
    InvalidField(&'static str),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
