//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is retried
//! - Compute the wait before the next attempt
//!
//! # Design Decisions
//! - Non-retryable faults always propagate
//! - `max_attempts` counts the first attempt

use std::fmt;
use std::time::Duration;
use crate::error::InvocationFault;
use crate::resilience::backoff::calculate_backoff;

/// Retry decision for one call.
pub trait Retryer: Send + Sync + fmt::Debug {
    /// `attempt` is the number of attempts made so far. `None` propagates the fault.
    fn continue_or_propagate(&self, attempt: u32, fault: &InvocationFault) -> Option<Duration>;
}

/// Exponential backoff up to `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultRetryer {
    pub period_ms: u64,
    pub max_period_ms: u64,
    pub max_attempts: u32,
}

impl Default for DefaultRetryer {
    fn default() -> Self {
        Self {
            period_ms: 100,
            max_period_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl DefaultRetryer {
    pub fn new(period_ms: u64, max_period_ms: u64, max_attempts: u32) -> Self {
        Self { period_ms, max_period_ms, max_attempts }
    }
}

impl Retryer for DefaultRetryer {
    fn continue_or_propagate(&self, attempt: u32, fault: &InvocationFault) -> Option<Duration> {
        if !fault.is_retryable() || attempt >= self.max_attempts {
            return None;
        }
        let max = Duration::from_millis(self.max_period_ms);
        Some(match fault.retry_after() {
            Some(after) => after.min(max),
            None => calculate_backoff(attempt, self.period_ms, self.max_period_ms),
        })
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl Retryer for NeverRetry {
    fn continue_or_propagate(&self, _attempt: u32, _fault: &InvocationFault) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_fault() -> InvocationFault {
        InvocationFault::Io {
            method: "GET".into(),
            url: "http://svc/x".into(),
            message: "connection refused".into(),
        }
    }

    #[test]
    fn test_default_retryer_stops_at_max_attempts() {
        let retryer = DefaultRetryer::new(10, 50, 3);
        assert!(retryer.continue_or_propagate(1, &io_fault()).is_some());
        assert!(retryer.continue_or_propagate(2, &io_fault()).is_some());
        assert!(retryer.continue_or_propagate(3, &io_fault()).is_none());
    }

    #[test]
    fn test_retry_after_is_capped() {
        let retryer = DefaultRetryer::new(10, 50, 3);
        let fault = InvocationFault::retryable(io_fault(), Some(Duration::from_secs(30)));
        assert_eq!(retryer.continue_or_propagate(1, &fault), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_status_faults_propagate() {
        let fault = InvocationFault::Status {
            status: 500,
            method_key: "Api#get()".into(),
            body: String::new(),
        };
        assert!(DefaultRetryer::default().continue_or_propagate(1, &fault).is_none());
        assert!(NeverRetry.continue_or_propagate(1, &io_fault()).is_none());
    }
}
