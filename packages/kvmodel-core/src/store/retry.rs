//! Backoff policy and operation deadlines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

impl RetryPolicy {
    /// Builds the batch retrieval policy from configuration.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            max_retries: config.batch_max_retries,
            initial_delay: Duration::from_millis(config.batch_retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.batch_retry_max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (zero based):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Shared flag a caller sets to cancel running operations.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Optional point in time plus optional cancellation flag, checked between
/// store round trips.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancel: Option<CancellationFlag>,
}

impl Deadline {
    /// No time limit and no cancellation.
    pub fn none() -> Self {
        Self::default()
    }

    /// Expires `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            cancel: None,
        }
    }

    /// Deadline from the configured operation timeout.
    pub fn from_config(config: &ModelConfig) -> Self {
        match config.operation_timeout_ms {
            Some(ms) => Self::after(Duration::from_millis(ms)),
            None => Self::none(),
        }
    }

    /// Attaches a cancellation flag.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fails if the operation was cancelled or the deadline passed.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationFlag::is_cancelled) {
            return Err(ModelError::Cancelled { operation });
        }
        if let Some(at) = self.expires_at {
            if Instant::now() >= at {
                return Err(ModelError::Timeout { operation });
            }
        }
        Ok(())
    }

    /// Sleeps for `delay`, cut short by the deadline, then checks it.
    pub fn sleep(&self, delay: Duration, operation: &'static str) -> Result<()> {
        let delay = match self.remaining() {
            Some(left) => delay.min(left),
            None => delay,
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.check(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;

    #[timeout(1000)]
    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(2), Duration::from_millis(40));
        assert_eq!(policy.delay_for(3), Duration::from_millis(50));
        assert_eq!(policy.delay_for(40), Duration::from_millis(50));
    }

    #[timeout(1000)]
    #[test]
    fn test_deadline_expiry_and_cancel() {
        assert!(Deadline::none().check("op").is_ok());
        assert_eq!(
            Deadline::after(Duration::ZERO).check("op"),
            Err(ModelError::Timeout { operation: "op" })
        );

        let flag = CancellationFlag::new();
        let deadline = Deadline::none().with_cancellation(flag.clone());
        assert!(deadline.check("op").is_ok());
        flag.cancel();
        assert_eq!(
            deadline.check("op"),
            Err(ModelError::Cancelled { operation: "op" })
        );
    }

    #[timeout(1000)]
    #[test]
    fn test_sleep_is_cut_by_deadline() {
        let deadline = Deadline::after(Duration::from_millis(20));
        let started = Instant::now();
        let result = deadline.sleep(Duration::from_secs(10), "op");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(result, Err(ModelError::Timeout { operation: "op" }));
    }
}
