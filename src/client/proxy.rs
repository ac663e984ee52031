//! Live client over a compiled contract.
//!
//! # Data Flow
//! ```text
//! invoke(method, args)
//!     → query map encoder (query map argument only)
//!     → RequestTemplate::expand → Encoder → interceptors (ascending order)
//!     → target URL → Transport::execute(current options)
//!     → 2xx (or 404 with decode_404): Decoder
//!       otherwise: ErrorDecoder
//!     → Retryer decides whether the fault is retried
//! ```
//!
//! # Design Decisions
//! - Options are read per attempt so a refresh applies to the next request
//! - With `ExceptionPropagation::Unwrap` an exhausted retryable fault is
//!   replaced by its cause

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::client::builder::{EffectiveClientConfig, ExceptionPropagation};
use crate::client::target::Target;
use crate::contract::{Contract, RequestTemplate, TypeDescriptor};
use crate::error::InvocationFault;
use crate::observability::logging::{log_request, log_response, log_retry};
use crate::observability::metrics::{record_request, record_retry};
use crate::transport::{Request, Transport};

pub struct ContractClient {
    name: String,
    target: Target,
    contract: Arc<Contract>,
    config: EffectiveClientConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ContractClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractClient")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("methods", &self.contract.templates().len())
            .field("transport", &self.transport)
            .finish()
    }
}

impl ContractClient {
    pub fn new(
        name: &str,
        target: Target,
        contract: Arc<Contract>,
        mut config: EffectiveClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        config.interceptors.sort_by_key(|i| i.order());
        Self {
            name: name.to_string(),
            target,
            contract,
            config,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn config(&self) -> &EffectiveClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Call a method by config key or unique method name.
    pub async fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvocationFault> {
        let template = self.contract.template(method)?.clone();
        let key = template.config_key();
        let args = self.encode_query_map(&template, args)?;
        let start = Instant::now();

        let mut attempt = 1;
        loop {
            match self.execute_once(&template, &args).await {
                Ok((status, value)) => {
                    record_request(&self.name, key, &status.to_string(), start);
                    return Ok(value);
                }
                Err(fault) => match self.config.retryer.continue_or_propagate(attempt, &fault) {
                    Some(delay) => {
                        log_retry(self.config.log_level, key, attempt, delay, &fault);
                        record_retry(&self.name, key);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        record_request(&self.name, key, fault.kind(), start);
                        return Err(self.propagate(fault));
                    }
                },
            }
        }
    }

    /// [`invoke`](Self::invoke) and deserialize the result.
    pub async fn invoke_as<T: DeserializeOwned>(&self, method: &str, args: &[Value]) -> Result<T, InvocationFault> {
        let value = self.invoke(method, args).await?;
        serde_json::from_value(value).map_err(|e| InvocationFault::Decode(e.to_string()))
    }

    fn encode_query_map<'a>(
        &self,
        template: &RequestTemplate,
        args: &'a [Value],
    ) -> Result<Cow<'a, [Value]>, InvocationFault> {
        let Some(index) = template.query_map_index() else {
            return Ok(Cow::Borrowed(args));
        };
        match args.get(index) {
            Some(value) if !value.is_null() => {
                let encoded = self
                    .config
                    .query_map_encoder
                    .encode(value)
                    .map_err(|reason| InvocationFault::Expansion { index, reason })?;
                let mut owned = args.to_vec();
                owned[index] = Value::Object(encoded);
                Ok(Cow::Owned(owned))
            }
            _ => Ok(Cow::Borrowed(args)),
        }
    }

    async fn execute_once(&self, template: &RequestTemplate, args: &[Value]) -> Result<(u16, Value), InvocationFault> {
        let key = template.config_key();
        let mut prepared = template.expand(args)?;
        if let Some(value) = prepared.body_value.clone() {
            self.config.encoder.encode(&value, template.body_type(), &mut prepared)?;
        }
        for interceptor in &self.config.interceptors {
            interceptor.apply(&mut prepared);
        }

        let request = Request {
            method: prepared.method,
            url: prepared.url(&self.target.url),
            headers: prepared.headers,
            body: prepared.body,
        };
        log_request(self.config.log_level, key, &request);
        let started = Instant::now();
        let response = self.transport.execute(request, self.config.options.current()).await?;
        log_response(self.config.log_level, key, &response, started.elapsed());

        let decode_missing =
            response.status == 404 && self.config.decode_404 && *template.return_type() != TypeDescriptor::Unit;
        if response.is_success() || decode_missing {
            let value = self.config.decoder.decode(&response, template.return_type())?;
            return Ok((response.status, value));
        }
        Err(self.config.error_decoder.decode(key, &response))
    }

    fn propagate(&self, fault: InvocationFault) -> InvocationFault {
        match (self.config.exception_propagation, fault) {
            (ExceptionPropagation::Unwrap, InvocationFault::Retryable { source, .. }) => *source,
            (_, fault) => fault,
        }
    }
}
