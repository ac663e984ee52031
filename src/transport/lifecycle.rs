//! Load-balancer lifecycle notifications.
//!
//! # Data Flow
//! ```text
//! LoadBalancedTransport
//!     → on_start (before an instance is chosen)
//!     → execute_with_lifecycle:
//!         → on_start_request (instance chosen)
//!         → delegate.execute
//!         → on_complete(Success | Failed)
//! No instance:
//!     → on_complete(Discard)
//! ```
//!
//! # Design Decisions
//! - Observer panics are caught and logged; the call's own outcome always wins
//! - The original fault is returned unchanged after observers run

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use crate::contract::{HttpMethod, MultiMap};
use crate::error::InvocationFault;
use crate::load_balancer::ServiceInstance;
use crate::resilience::Options;
use crate::transport::{Request, Response, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    Failed,
    /// No instance was available; nothing was sent.
    Discard,
}

/// Request snapshot handed to observers.
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: HttpMethod,
    pub url: String,
    pub headers: MultiMap,
}

impl From<&Request> for RequestData {
    fn from(request: &Request) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub headers: MultiMap,
    pub request: RequestData,
}

impl From<&Response> for ResponseData {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            request: RequestData::from(&response.request),
        }
    }
}

/// Load-balancer view of a call.
#[derive(Debug, Clone)]
pub struct LoadBalancerRequest {
    pub service_id: String,
    pub request: RequestData,
}

#[derive(Debug)]
pub struct Completion<'a> {
    pub status: CompletionStatus,
    pub request: &'a LoadBalancerRequest,
    pub instance: Option<&'a Arc<ServiceInstance>>,
    pub response: Option<ResponseData>,
    pub error: Option<&'a InvocationFault>,
}

/// Observer of load-balanced calls.
pub trait LoadBalancerLifecycle: Send + Sync {
    fn on_start(&self, _request: &LoadBalancerRequest) {}

    fn on_start_request(&self, _request: &LoadBalancerRequest, _instance: Option<&Arc<ServiceInstance>>) {}

    fn on_complete(&self, _completion: &Completion<'_>) {}
}

/// Call `f` on each observer, containing panics.
pub(crate) fn notify_all<F>(observers: &[Arc<dyn LoadBalancerLifecycle>], phase: &'static str, f: F)
where
    F: Fn(&dyn LoadBalancerLifecycle),
{
    for observer in observers {
        if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
            tracing::warn!(phase, "Load balancer lifecycle observer panicked");
        }
    }
}

/// Execute `request` through `transport` with lifecycle notifications.
///
/// Completion callbacks only run when `load_balanced` is set.
pub async fn execute_with_lifecycle(
    transport: &dyn Transport,
    request: Request,
    options: Options,
    lb_request: &LoadBalancerRequest,
    instance: Option<&Arc<ServiceInstance>>,
    observers: &[Arc<dyn LoadBalancerLifecycle>],
    load_balanced: bool,
) -> Result<Response, InvocationFault> {
    notify_all(observers, "start_request", |o| o.on_start_request(lb_request, instance));

    let result = transport.execute(request, options).await;
    if !load_balanced {
        return result;
    }

    match &result {
        Ok(response) => {
            let completion = Completion {
                status: CompletionStatus::Success,
                request: lb_request,
                instance,
                response: Some(ResponseData::from(response)),
                error: None,
            };
            notify_all(observers, "complete", |o| o.on_complete(&completion));
        }
        Err(fault) => {
            let completion = Completion {
                status: CompletionStatus::Failed,
                request: lb_request,
                instance,
                response: None,
                error: Some(fault),
            };
            notify_all(observers, "complete", |o| o.on_complete(&completion));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use bytes::Bytes;

    #[derive(Debug)]
    struct Fixed(Result<u16, ()>);

    #[async_trait]
    impl Transport for Fixed {
        async fn execute(&self, request: Request, _options: Options) -> Result<Response, InvocationFault> {
            match self.0 {
                Ok(status) => Ok(Response {
                    status,
                    headers: MultiMap::headers(),
                    body: Bytes::new(),
                    request,
                }),
                Err(()) => Err(InvocationFault::Io {
                    method: request.method.to_string(),
                    url: request.url,
                    message: "connection reset".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl LoadBalancerLifecycle for Recorder {
        fn on_start_request(&self, _request: &LoadBalancerRequest, _instance: Option<&Arc<ServiceInstance>>) {
            self.events.lock().unwrap().push("start".into());
        }

        fn on_complete(&self, completion: &Completion<'_>) {
            self.events.lock().unwrap().push(format!("{:?}", completion.status));
        }
    }

    struct Panicking;

    impl LoadBalancerLifecycle for Panicking {
        fn on_complete(&self, _completion: &Completion<'_>) {
            panic!("observer failure");
        }
    }

    fn lb_request() -> (Request, LoadBalancerRequest) {
        let request = Request::new(HttpMethod::Get, "http://127.0.0.1:1/x");
        let lb = LoadBalancerRequest {
            service_id: "svc".into(),
            request: RequestData::from(&request),
        };
        (request, lb)
    }

    #[tokio::test]
    async fn test_success_ordering() {
        let recorder = Arc::new(Recorder::default());
        let observers: Vec<Arc<dyn LoadBalancerLifecycle>> = vec![recorder.clone()];
        let (request, lb) = lb_request();

        let response = execute_with_lifecycle(&Fixed(Ok(200)), request, Options::default(), &lb, None, &observers, true)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(*recorder.events.lock().unwrap(), vec!["start", "Success"]);
    }

    #[tokio::test]
    async fn test_failure_preserves_fault_despite_panicking_observer() {
        let recorder = Arc::new(Recorder::default());
        let observers: Vec<Arc<dyn LoadBalancerLifecycle>> = vec![Arc::new(Panicking), recorder.clone()];
        let (request, lb) = lb_request();

        let err = execute_with_lifecycle(&Fixed(Err(())), request, Options::default(), &lb, None, &observers, true)
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationFault::Io { ref message, .. } if message == "connection reset"));
        assert_eq!(*recorder.events.lock().unwrap(), vec!["start", "Failed"]);
    }

    #[tokio::test]
    async fn test_no_completion_when_not_load_balanced() {
        let recorder = Arc::new(Recorder::default());
        let observers: Vec<Arc<dyn LoadBalancerLifecycle>> = vec![recorder.clone()];
        let (request, lb) = lb_request();

        execute_with_lifecycle(&Fixed(Ok(204)), request, Options::default(), &lb, None, &observers, false)
            .await
            .unwrap();
        assert_eq!(*recorder.events.lock().unwrap(), vec!["start"]);
    }
}
