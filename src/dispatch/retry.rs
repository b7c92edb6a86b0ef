use super::work_item::WorkItem;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// -----------------------------------------------------------------------------
// ----- RetryPolicy -----------------------------------------------------------

/// Bounded retry by requeueing onto the tail of the same queue, with no delay.
///
/// The n-th failed delivery of an item stamps it with counter n. It is
/// requeued while n < `max_attempts` and dropped when n reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Requeue { attempt: u32, raw: String },
    Exhausted { attempts: u32 },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what happens to `item` after a failed delivery.
    pub fn decide(&self, item: &WorkItem) -> RetryDecision {
        let failures = item.retries().unwrap_or(0).saturating_add(1);

        if failures >= self.max_attempts {
            RetryDecision::Exhausted { attempts: failures }
        } else {
            RetryDecision::Requeue {
                attempt: failures,
                raw: item.to_requeue(failures),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
