//! Load-balancing transport.
//!
//! Treats the request host as a service id, picks an instance through an
//! [`InstanceChooser`], rewrites the URL onto it and delegates.

use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;
use crate::contract::MultiMap;
use crate::error::InvocationFault;
use crate::load_balancer::InstanceChooser;
use crate::resilience::Options;
use crate::transport::lifecycle::{
    execute_with_lifecycle, notify_all, Completion, CompletionStatus, LoadBalancerLifecycle,
    LoadBalancerRequest, RequestData,
};
use crate::transport::{Request, Response, Transport};

pub struct LoadBalancedTransport {
    delegate: Arc<dyn Transport>,
    chooser: Arc<dyn InstanceChooser>,
    observers: Vec<Arc<dyn LoadBalancerLifecycle>>,
}

impl LoadBalancedTransport {
    pub fn new(delegate: Arc<dyn Transport>, chooser: Arc<dyn InstanceChooser>) -> Self {
        Self {
            delegate,
            chooser,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoadBalancerLifecycle>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl fmt::Debug for LoadBalancedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBalancedTransport")
            .field("delegate", &self.delegate)
            .field("chooser", &self.chooser)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[async_trait]
impl Transport for LoadBalancedTransport {
    async fn execute(&self, request: Request, options: Options) -> Result<Response, InvocationFault> {
        let service_id = Url::parse(&request.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| InvocationFault::Io {
                method: request.method.to_string(),
                url: request.url.clone(),
                message: "request URL has no host to use as a service id".into(),
            })?;

        let lb_request = LoadBalancerRequest {
            service_id: service_id.clone(),
            request: RequestData::from(&request),
        };
        notify_all(&self.observers, "start", |o| o.on_start(&lb_request));

        let Some(instance) = self.chooser.choose(&service_id) else {
            let completion = Completion {
                status: CompletionStatus::Discard,
                request: &lb_request,
                instance: None,
                response: None,
                error: None,
            };
            notify_all(&self.observers, "complete", |o| o.on_complete(&completion));
            let fault = InvocationFault::NoInstance { service_id };
            tracing::warn!(url = %request.url, error = %fault, "No instance available");
            let mut headers = MultiMap::headers();
            headers.append("Content-Type", "text/plain");
            return Ok(Response {
                status: 503,
                headers,
                body: Bytes::from(fault.to_string()),
                request,
            });
        };

        let url = instance.reconstruct(&request.url).map_err(|e| InvocationFault::Io {
            method: request.method.to_string(),
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(service_id = %service_id, url = %url, "Chose service instance");
        let rewritten = Request { url, ..request };

        execute_with_lifecycle(
            self.delegate.as_ref(),
            rewritten,
            options,
            &lb_request,
            Some(&instance),
            &self.observers,
            true,
        )
        .await
    }

    fn delegate(&self) -> Option<Arc<dyn Transport>> {
        Some(self.delegate.clone())
    }

    fn is_load_balanced(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::config::schema::InstanceConfig;
    use crate::contract::HttpMethod;
    use crate::load_balancer::StaticInstanceRegistry;

    #[derive(Debug, Default)]
    struct Echo {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Echo {
        async fn execute(&self, request: Request, _options: Options) -> Result<Response, InvocationFault> {
            self.urls.lock().unwrap().push(request.url.clone());
            Ok(Response {
                status: 200,
                headers: MultiMap::headers(),
                body: Bytes::new(),
                request,
            })
        }
    }

    #[derive(Default)]
    struct Statuses(Mutex<Vec<CompletionStatus>>);

    impl LoadBalancerLifecycle for Statuses {
        fn on_complete(&self, completion: &Completion<'_>) {
            self.0.lock().unwrap().push(completion.status);
        }
    }

    fn transport(echo: Arc<Echo>, statuses: Arc<Statuses>) -> LoadBalancedTransport {
        let registry = StaticInstanceRegistry::new(&[InstanceConfig {
            service_id: "users".into(),
            host: "10.1.2.3".into(),
            port: 9000,
            secure: false,
        }]);
        LoadBalancedTransport::new(echo, Arc::new(registry)).with_observer(statuses)
    }

    #[tokio::test]
    async fn test_rewrites_to_instance() {
        let echo = Arc::new(Echo::default());
        let statuses = Arc::new(Statuses::default());
        let lb = transport(echo.clone(), statuses.clone());

        let response = lb
            .execute(Request::new(HttpMethod::Get, "http://users/api/1?x=y"), Options::default())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(*echo.urls.lock().unwrap(), vec!["http://10.1.2.3:9000/api/1?x=y"]);
        assert_eq!(*statuses.0.lock().unwrap(), vec![CompletionStatus::Success]);
        assert!(lb.is_load_balanced());
        assert!(lb.delegate().is_some());
    }

    #[tokio::test]
    async fn test_unknown_service_is_discarded_with_503() {
        let echo = Arc::new(Echo::default());
        let statuses = Arc::new(Statuses::default());
        let lb = transport(echo.clone(), statuses.clone());

        let response = lb
            .execute(Request::new(HttpMethod::Get, "http://billing/x"), Options::default())
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(response.body_text().contains("billing"));
        assert!(echo.urls.lock().unwrap().is_empty());
        assert_eq!(*statuses.0.lock().unwrap(), vec![CompletionStatus::Discard]);
    }
}
