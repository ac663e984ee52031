//! Service name, URL and path normalization.

use url::{Host, Url};
use crate::error::{ConfigError, ContractError};

/// Validate that `name` is usable as a host. Returns it unchanged.
pub fn normalize_service_name(name: &str) -> Result<String, ConfigError> {
    if name.trim().is_empty() {
        return Ok(String::new());
    }
    let candidate = if name.starts_with("http://") || name.starts_with("https://") {
        name.to_string()
    } else {
        format!("http://{}", name)
    };
    let legal = Url::parse(&candidate).ok().is_some_and(|url| match url.host() {
        Some(Host::Domain(domain)) => domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'),
        Some(_) => true,
        None => false,
    });
    if legal {
        Ok(name.to_string())
    } else {
        Err(ConfigError::IllegalServiceName { name: name.to_string() })
    }
}

/// Prefix `http://` when no scheme is present and check the result parses.
/// `#{...}` expressions are returned untouched.
pub fn normalize_url(raw: &str) -> Result<String, ContractError> {
    if raw.trim().is_empty() || (raw.starts_with("#{") && raw.contains('}')) {
        return Ok(raw.to_string());
    }
    let url = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    match Url::parse(&url) {
        Ok(_) => Ok(url),
        Err(e) => Err(ContractError::MalformedUrl {
            url,
            reason: e.to_string(),
        }),
    }
}

/// Trim, force one leading `/` and drop one trailing `/`.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut path = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    if path.ends_with('/') {
        path.pop();
    }
    path
}
