//! Direct HTTP transport over hyper-util's pooled client.
//!
//! # Design Decisions
//! - One pooled client per transport; connection reuse is hyper's concern
//! - Connect timeout is fixed when the connector is built; the read
//!   deadline comes from each call's options
//! - Redirects are followed here, at most `MAX_REDIRECTS` hops

use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;
use crate::contract::{HttpMethod, MultiMap};
use crate::error::InvocationFault;
use crate::resilience::timeouts::with_read_timeout;
use crate::resilience::Options;
use crate::transport::{Request, Response, Transport};

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::with_connect_timeout(Options::default().connect_timeout)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    async fn send_once(&self, request: &Request) -> Result<(u16, MultiMap, Bytes), InvocationFault> {
        let io_fault = |message: String| InvocationFault::Io {
            method: request.method.to_string(),
            url: request.url.clone(),
            message,
        };

        let mut builder = hyper::Request::builder()
            .method(hyper::Method::from(request.method))
            .uri(&request.url);
        for (name, values) in request.headers.iter() {
            for value in values {
                builder = builder.header(name, value);
            }
        }
        let outbound = builder
            .body(Full::new(request.body.clone().unwrap_or_default()))
            .map_err(|e| io_fault(e.to_string()))?;

        let response: hyper::Response<Incoming> = self
            .client
            .request(outbound)
            .await
            .map_err(|e| io_fault(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| io_fault(e.to_string()))?
            .to_bytes();

        let mut headers = MultiMap::headers();
        for (name, value) in parts.headers.iter() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Ok((parts.status.as_u16(), headers, body))
    }

    async fn send(&self, mut request: Request, follow_redirects: bool) -> Result<Response, InvocationFault> {
        let mut hops = 0;
        loop {
            let (status, headers, body) = self.send_once(&request).await?;
            let location = headers.first("Location").map(str::to_string);
            let redirect = matches!(status, 301 | 302 | 303 | 307 | 308);

            match location {
                Some(location) if redirect && follow_redirects && hops < MAX_REDIRECTS => {
                    hops += 1;
                    let next = Url::parse(&request.url)
                        .and_then(|base| base.join(&location))
                        .map_err(|e| InvocationFault::Io {
                            method: request.method.to_string(),
                            url: location.clone(),
                            message: e.to_string(),
                        })?;
                    tracing::debug!(status, from = %request.url, to = %next, "Following redirect");
                    if status == 303 || ((status == 301 || status == 302) && request.method == HttpMethod::Post) {
                        request.method = HttpMethod::Get;
                        request.body = None;
                        request.headers.remove("Content-Type");
                        request.headers.remove("Content-Length");
                    }
                    request.url = next.to_string();
                }
                _ => {
                    return Ok(Response {
                        status,
                        headers,
                        body,
                        request,
                    })
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn execute(&self, request: Request, options: Options) -> Result<Response, InvocationFault> {
        let url = request.url.clone();
        with_read_timeout(options.read_timeout, &url, self.send(request, options.follow_redirects)).await
    }
}
