//! Request interceptors.
//!
//! Interceptors run in ascending `order()` after template expansion and body
//! encoding, just before the target URL is applied.

use std::collections::BTreeMap;
use std::fmt;
use crate::contract::PreparedRequest;

/// Runs last among interceptors.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

pub trait RequestInterceptor: Send + Sync + fmt::Debug {
    fn apply(&self, request: &mut PreparedRequest);

    fn order(&self) -> i32 {
        0
    }
}

/// Adds configured headers the request does not already carry.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeadersInterceptor {
    headers: BTreeMap<String, Vec<String>>,
}

impl DefaultHeadersInterceptor {
    pub fn new(headers: BTreeMap<String, Vec<String>>) -> Self {
        Self { headers }
    }
}

impl RequestInterceptor for DefaultHeadersInterceptor {
    fn apply(&self, request: &mut PreparedRequest) {
        for (name, values) in &self.headers {
            if !request.headers.contains_key(name) {
                request.headers.append_all(name, values.iter().cloned());
            }
        }
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// Adds configured query parameters the request does not already carry.
#[derive(Debug, Clone, Default)]
pub struct DefaultQueryParametersInterceptor {
    parameters: BTreeMap<String, Vec<String>>,
}

impl DefaultQueryParametersInterceptor {
    pub fn new(parameters: BTreeMap<String, Vec<String>>) -> Self {
        Self { parameters }
    }
}

impl RequestInterceptor for DefaultQueryParametersInterceptor {
    fn apply(&self, request: &mut PreparedRequest) {
        for (name, values) in &self.parameters {
            if !request.queries.contains_key(name) {
                request.queries.append_all(name, values.iter().cloned());
            }
        }
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}
