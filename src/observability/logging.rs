//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries
//! - Log requests, responses and retries at the client's `LogLevel`
//!
//! # Design Decisions
//! - `EnvFilter` from `RUST_LOG`, falling back to a crate default
//! - `Basic` logs the request line and status, `Headers` adds headers,
//!   `Full` adds bodies

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::transport::{Request, Response};

/// How much of each exchange a client logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    None,
    Basic,
    Headers,
    Full,
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn render_headers(headers: &crate::contract::MultiMap) -> String {
    headers
        .iter()
        .map(|(k, vs)| format!("{}: {}", k, vs.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn log_request(level: LogLevel, config_key: &str, request: &Request) {
    match level {
        LogLevel::None => {}
        LogLevel::Basic => {
            tracing::info!(key = %config_key, method = %request.method, url = %request.url, "---> request");
        }
        LogLevel::Headers => {
            tracing::info!(
                key = %config_key,
                method = %request.method,
                url = %request.url,
                headers = %render_headers(&request.headers),
                "---> request"
            );
        }
        LogLevel::Full => {
            let body = request
                .body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            tracing::info!(
                key = %config_key,
                method = %request.method,
                url = %request.url,
                headers = %render_headers(&request.headers),
                body = %body,
                "---> request"
            );
        }
    }
}

pub fn log_response(level: LogLevel, config_key: &str, response: &Response, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match level {
        LogLevel::None => {}
        LogLevel::Basic => {
            tracing::info!(key = %config_key, status = response.status, elapsed_ms, "<--- response");
        }
        LogLevel::Headers => {
            tracing::info!(
                key = %config_key,
                status = response.status,
                elapsed_ms,
                headers = %render_headers(&response.headers),
                "<--- response"
            );
        }
        LogLevel::Full => {
            tracing::info!(
                key = %config_key,
                status = response.status,
                elapsed_ms,
                headers = %render_headers(&response.headers),
                body = %String::from_utf8_lossy(&response.body),
                "<--- response"
            );
        }
    }
}

pub fn log_retry(level: LogLevel, config_key: &str, attempt: u32, delay: Duration, fault: &crate::error::InvocationFault) {
    if level > LogLevel::None {
        tracing::info!(
            key = %config_key,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %fault,
            "---> retrying"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse_and_order() {
        let level: LogLevel = serde_json::from_str("\"headers\"").unwrap();
        assert_eq!(level, LogLevel::Headers);
        assert!(LogLevel::Full > LogLevel::Basic);
        assert_eq!(LogLevel::default(), LogLevel::None);
    }
}
