use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::gateway::{SendError, SessionPool};
use crate::queue::{QueueError, WorkQueue};

use super::retry::{RetryDecision, RetryPolicy};
use super::work_item::{ParseError, WorkItem};

// -----------------------------------------------------------------------------
// ----- Outcome ---------------------------------------------------------------

/// Where one dequeued item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    /// Unparseable record; dropped without touching the pool.
    Malformed,
    /// Permanently undeliverable (oversized payload); dropped.
    Rejected,
    Requeued { attempt: u32 },
    Exhausted { attempts: u32 },
    /// The pool closed before a send; the record went back unchanged.
    Returned,
    /// The requeue push itself failed.
    Lost,
}

// -----------------------------------------------------------------------------
// ----- Dispatcher ------------------------------------------------------------

/// Pops records one at a time and hands each to its own task. Fan-out is not
/// capped here: workers beyond the pool size wait in `SessionPool::acquire`.
pub struct Dispatcher {
    worker: Arc<Worker>,
    in_flight: JoinSet<Outcome>,
}

struct Worker {
    queue: Arc<dyn WorkQueue>,
    pool: Arc<SessionPool>,
    policy: RetryPolicy,
    log_successes: bool,
}

// -----------------------------------------------------------------------------
// ----- Dispatcher: Static ----------------------------------------------------

impl Dispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>, pool: Arc<SessionPool>, config: &DispatchConfig) -> Self {
        Self {
            worker: Arc::new(Worker {
                queue,
                pool,
                policy: RetryPolicy::new(config.max_delivery_attempts),
                log_successes: config.log_successes,
            }),
            in_flight: JoinSet::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Dispatcher: Public ----------------------------------------------------

impl Dispatcher {
    /// Runs until the queue fails. There is no stop signal; callers race it
    /// against their own (e.g. ctrl-c) and then call `drain`.
    pub async fn run(&mut self) -> Result<(), QueueError> {
        loop {
            let raw = self.worker.queue.pop().await?;

            while let Some(done) = self.in_flight.try_join_next() {
                if let Err(e) = done {
                    error!("delivery task failed: {e}");
                }
            }

            let worker = self.worker.clone();
            self.in_flight.spawn(async move { worker.process(raw).await });
        }
    }

    /// Delivers a single record on the current task.
    pub async fn process(&self, raw: impl Into<Vec<u8>>) -> Outcome {
        self.worker.process(raw.into()).await
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Waits up to `grace` for in-flight deliveries, then aborts the rest.
    /// Returns how many were aborted.
    pub async fn drain(&mut self, grace: Duration) -> usize {
        let pending = self.in_flight.len();
        if pending == 0 {
            return 0;
        }

        info!(
            "waiting up to {} for {pending} in-flight deliveries",
            humantime::format_duration(grace)
        );

        let in_flight = &mut self.in_flight;
        let finished = timeout(grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let aborted = self.in_flight.len();
        warn!("aborting {aborted} deliveries still in flight");
        self.in_flight.abort_all();
        while self.in_flight.join_next().await.is_some() {}

        aborted
    }
}

// -----------------------------------------------------------------------------
// ----- Worker ----------------------------------------------------------------

impl Worker {
    async fn process(&self, raw: Vec<u8>) -> Outcome {
        let raw = match String::from_utf8(raw) {
            Ok(raw) => raw,
            Err(e) => {
                let err = ParseError::from(e.utf8_error());
                let lossy = String::from_utf8_lossy(e.as_bytes());
                error!("dropping malformed item ({err}): {lossy}");
                return Outcome::Malformed;
            }
        };

        let item = match WorkItem::parse(&raw) {
            Ok(item) => item,
            Err(e) => {
                error!("dropping malformed item ({e}): {raw}");
                return Outcome::Malformed;
            }
        };

        let session = match self.pool.acquire().await {
            Ok(session) => session,
            Err(e) => {
                warn!("returning item (ID {}) to queue: {e}", item.identifier());
                return self.push(raw, Outcome::Returned).await;
            }
        };

        debug!(
            "sending item (ID {}) on session #{}",
            item.identifier(),
            session.id()
        );
        let result = session.send(&item.notification).await;
        session.release();

        match result {
            Ok(()) => {
                if self.log_successes {
                    info!("sent: {raw}");
                }
                Outcome::Sent
            }
            Err(e) if !e.is_retryable() => {
                error!("dropping item (ID {}): {e}", item.identifier());
                Outcome::Rejected
            }
            Err(e) => self.retry(&item, &raw, e).await,
        }
    }

    async fn retry(&self, item: &WorkItem, raw: &str, err: SendError) -> Outcome {
        match self.policy.decide(item) {
            RetryDecision::Requeue { attempt, raw } => {
                info!(
                    "send error (ID {}): {err}. retrying count ({attempt})",
                    item.identifier()
                );
                self.push(raw, Outcome::Requeued { attempt }).await
            }
            RetryDecision::Exhausted { attempts } => {
                error!(
                    "final send error (ID {}) after {attempts} attempts: {err} | {raw}",
                    item.identifier()
                );
                Outcome::Exhausted { attempts }
            }
        }
    }

    async fn push(&self, raw: String, outcome: Outcome) -> Outcome {
        match self.queue.push(raw).await {
            Ok(()) => outcome,
            Err(e) => {
                error!("queue push failed, item lost: {e}");
                Outcome::Lost
            }
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
