pub mod dispatcher;
pub mod retry;
pub mod work_item;

pub use dispatcher::{Dispatcher, Outcome};
pub use retry::{RetryDecision, RetryPolicy};
pub use work_item::{ParseError, RETRY_FIELD, WorkItem};
