//! Service instance abstraction.
//!
//! # Responsibilities
//! - Represent one reachable instance of a logical service
//! - Rewrite a logical `http://{service-id}/...` URL onto the instance

use serde::Serialize;
use url::Url;

/// A single instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// Pre-calculated base URL.
    #[serde(serialize_with = "url_as_str")]
    pub base_url: Url,
}

fn url_as_str<S: serde::Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}

impl ServiceInstance {
    pub fn new(service_id: &str, host: &str, port: u16, secure: bool) -> Result<Self, url::ParseError> {
        let scheme = if secure { "https" } else { "http" };
        let base_url = Url::parse(&format!("{}://{}:{}", scheme, host, port))?;
        Ok(Self {
            service_id: service_id.to_string(),
            host: host.to_string(),
            port,
            secure,
            base_url,
        })
    }

    /// Replace scheme, host and port of `original`, keeping path and query.
    pub fn reconstruct(&self, original: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(original)?;
        let scheme = if self.secure { "https" } else { "http" };
        // switching between the two special schemes cannot fail
        let _ = url.set_scheme(scheme);
        url.set_host(Some(&self.host))?;
        let _ = url.set_port(Some(self.port));
        Ok(url.to_string())
    }
}
