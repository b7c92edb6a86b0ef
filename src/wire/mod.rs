pub mod frame;
pub mod status;

pub use frame::{DEFAULT_EXPIRY, FrameError, MAX_PAYLOAD_SIZE, Notification, NotificationFrame};
pub use status::{GatewayStatus, RESPONSE_SIZE, StatusError};
