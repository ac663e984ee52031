//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! ContractClient
//!     → Transport::execute(request, options)
//!         - hyper_client.rs: direct HTTP via hyper-util's pooled client
//!         - load_balanced.rs: choose instance, rewrite URL, delegate
//!             → lifecycle.rs (observers around the delegate call)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Transports are async trait objects shared via Arc
//! - A load-balancing transport exposes its delegate so a client with a
//!   fixed URL can bypass instance selection

pub mod hyper_client;
pub mod lifecycle;
pub mod load_balanced;

use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use crate::contract::{HttpMethod, MultiMap};
use crate::error::InvocationFault;
use crate::resilience::Options;

pub use hyper_client::HyperTransport;
pub use lifecycle::{execute_with_lifecycle, LoadBalancerLifecycle};
pub use load_balanced::LoadBalancedTransport;

/// Outbound request with an absolute URL.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    pub url: String,
    pub headers: MultiMap,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: MultiMap::headers(),
            body: None,
        }
    }
}

/// Response as received.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: MultiMap,
    pub body: Bytes,
    /// The request that produced this response.
    pub request: Request,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn execute(&self, request: Request, options: Options) -> Result<Response, InvocationFault>;

    /// The wrapped transport, for load-balancing wrappers.
    fn delegate(&self) -> Option<Arc<dyn Transport>> {
        None
    }

    fn is_load_balanced(&self) -> bool {
        false
    }
}
