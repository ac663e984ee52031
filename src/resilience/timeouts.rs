//! Request options and timeout enforcement.
//!
//! # Design Decisions
//! - Connect timeout, read timeout and redirect policy travel as one value
//! - The read deadline uses Tokio's timer; expiry is a distinct fault

use std::future::Future;
use std::time::{Duration, Instant};
use serde::{Serialize, Serializer};
use crate::error::InvocationFault;

/// Per-request transport options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Options {
    #[serde(rename = "connect_timeout_ms", serialize_with = "as_millis")]
    pub connect_timeout: Duration,
    #[serde(rename = "read_timeout_ms", serialize_with = "as_millis")]
    pub read_timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            follow_redirects: true,
        }
    }
}

impl Options {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, follow_redirects: bool) -> Self {
        Self { connect_timeout, read_timeout, follow_redirects }
    }
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Run `fut` under the read deadline.
pub async fn with_read_timeout<F, T>(
    read_timeout: Duration,
    url: &str,
    fut: F,
) -> Result<T, InvocationFault>
where
    F: Future<Output = Result<T, InvocationFault>>,
{
    let started = Instant::now();
    match tokio::time::timeout(read_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(InvocationFault::Timeout {
            url: url.to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_timeout() {
        let result: Result<(), _> = with_read_timeout(Duration::from_millis(20), "http://slow", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(InvocationFault::Timeout { .. })));

        let fast = with_read_timeout(Duration::from_secs(1), "http://fast", async { Ok(5) }).await;
        assert_eq!(fast.unwrap(), 5);
    }

    #[test]
    fn test_options_serialize_as_millis() {
        let json = serde_json::to_value(Options::default()).unwrap();
        assert_eq!(json["connect_timeout_ms"], 10_000);
        assert_eq!(json["read_timeout_ms"], 60_000);
    }
}
