//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0) and header names
//! - Reject blank component names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientProperties → Result<(), Vec<ValidationError>>
//! - Runs before properties are accepted into the system

use std::fmt;
use crate::config::schema::{ClientConfigProperties, ClientProperties};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: String, message: &str) -> Self {
        Self { field, message: message.to_string() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_properties(props: &ClientProperties) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if props.default_config.trim().is_empty() {
        errors.push(ValidationError::new("default_config".into(), "must not be empty"));
    }

    let mut names: Vec<&String> = props.config.keys().collect();
    names.sort();
    for name in names {
        validate_bucket(&format!("config.{}", name), &props.config[name], &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_bucket(prefix: &str, bucket: &ClientConfigProperties, errors: &mut Vec<ValidationError>) {
    if bucket.connect_timeout == Some(0) {
        errors.push(ValidationError::new(format!("{}.connect_timeout", prefix), "must be greater than 0"));
    }
    if bucket.read_timeout == Some(0) {
        errors.push(ValidationError::new(format!("{}.read_timeout", prefix), "must be greater than 0"));
    }

    if let Some(headers) = &bucket.default_request_headers {
        for name in headers.keys() {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.default_request_headers.{}", prefix, name),
                    "is not a valid header name",
                ));
            }
        }
    }

    let singles = [
        ("retryer", &bucket.retryer),
        ("error_decoder", &bucket.error_decoder),
        ("encoder", &bucket.encoder),
        ("decoder", &bucket.decoder),
        ("contract", &bucket.contract),
        ("query_map_encoder", &bucket.query_map_encoder),
    ];
    for (field, value) in singles {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(ValidationError::new(format!("{}.{}", prefix, field), "component name must not be blank"));
        }
    }

    let lists = [
        ("request_interceptors", &bucket.request_interceptors),
        ("capabilities", &bucket.capabilities),
    ];
    for (field, values) in lists {
        if values.iter().flatten().any(|v| v.trim().is_empty()) {
            errors.push(ValidationError::new(format!("{}.{}", prefix, field), "component name must not be blank"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_valid_properties() {
        assert!(validate_properties(&ClientProperties::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut props = ClientProperties { default_config: " ".into(), ..Default::default() };
        let mut headers = BTreeMap::new();
        headers.insert("Bad Header".to_string(), vec!["x".to_string()]);
        props.config.insert(
            "users".into(),
            ClientConfigProperties {
                connect_timeout: Some(0),
                retryer: Some("".into()),
                request_interceptors: Some(vec!["auth".into(), " ".into()]),
                default_request_headers: Some(headers),
                ..Default::default()
            },
        );

        let errors = validate_properties(&props).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "default_config",
                "config.users.connect_timeout",
                "config.users.default_request_headers.Bad Header",
                "config.users.retryer",
                "config.users.request_interceptors",
            ]
        );
    }
}
