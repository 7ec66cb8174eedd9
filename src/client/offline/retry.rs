//! # Retry Policy
//!
//! Attempt-ceiling policy for pending deletions. Every drain retries every
//! queued item immediately; there is no delay between attempts. An item is
//! dropped once its attempt count reaches the ceiling.

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep the item for the next drain
    Retry,
    /// Drop the item permanently
    GiveUp,
}

/// Bounded retry without backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy; a ceiling of zero is treated as one
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide what to do after the `attempts`-th attempt failed
    pub fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}
