//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client invocation produces:
//!     → logging.rs (per-client request/response events, gated by LogLevel)
//!     → metrics.rs (counters and latency histogram)
//!
//! Consumers:
//!     → tracing-subscriber installed by the binary
//!     → any recorder installed for the metrics facade
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never formatted payloads
//! - Per-client log level decides how much of a request is logged
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::LogLevel;
