pub mod pool;
pub mod session;
pub mod transport;

pub use pool::{PoolError, PoolStats, PooledSession, SessionPool};
pub use session::{GatewaySession, RESPONSE_TIMEOUT, SendError};
pub use transport::Dialer;

// Gateway orchestration; the frame format itself lives in `wire`.
