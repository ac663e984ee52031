//! Capabilities wrap components of a client as it is built.

use std::fmt;
use std::sync::Arc;
use crate::client::codec::ErrorDecoder;
use crate::resilience::Retryer;
use crate::transport::Transport;

/// Enriches built components. Every hook defaults to returning its input.
pub trait Capability: Send + Sync + fmt::Debug {
    fn order(&self) -> i32 {
        0
    }

    fn enrich_transport(&self, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        transport
    }

    fn enrich_retryer(&self, retryer: Arc<dyn Retryer>) -> Arc<dyn Retryer> {
        retryer
    }

    fn enrich_error_decoder(&self, decoder: Arc<dyn ErrorDecoder>) -> Arc<dyn ErrorDecoder> {
        decoder
    }
}
