pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod queue;
pub mod tls;
pub mod wire;

pub use config::Config;
pub use dispatch::{Dispatcher, Outcome};
pub use gateway::SessionPool;
pub use queue::{RedisQueue, WorkQueue};
