//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call executing:
//!     → timeouts.rs (read deadline around the transport call)
//!     → On retryable fault: retries.rs (Retryer decides: wait or propagate)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Retryers are stateless; the attempt number travels with the call
//! - A server-provided Retry-After wins over computed backoff, capped at the max period
//! - Only faults marked retryable reach the retryer's decision

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{DefaultRetryer, NeverRetry, Retryer};
pub use timeouts::Options;
