//! Placeholder resolution.
//!
//! `${key}` and `${key:default}` are substituted from an [`Environment`].
//! `#{...}` expressions are left untouched; they are evaluated elsewhere.

use std::collections::HashMap;
use crate::error::ContractError;

/// Read-only property lookup.
pub trait Environment: Send + Sync {
    fn property(&self, key: &str) -> Option<String>;
}

/// Properties held in memory.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl From<HashMap<String, String>> for MapEnvironment {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl Environment for MapEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Process environment. `a.b-c` is also looked up as `A_B_C`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().or_else(|| {
            let relaxed: String = key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            std::env::var(relaxed).ok()
        })
    }
}

/// Substitute every `${...}` in `value`.
pub fn resolve_placeholders(value: &str, env: &dyn Environment) -> Result<String, ContractError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // unterminated, keep verbatim
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let expr = &after[..end];
        let (key, default) = match expr.split_once(':') {
            Some((k, d)) => (k, Some(d)),
            None => (expr, None),
        };
        match env.property(key).or_else(|| default.map(str::to_string)) {
            Some(resolved) => out.push_str(&resolved),
            None => {
                return Err(ContractError::UnresolvablePlaceholder {
                    placeholder: key.to_string(),
                    value: value.to_string(),
                })
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_placeholders() {
        let env = MapEnvironment::new().with("svc.version", "v2");
        assert_eq!(resolve_placeholders("/${svc.version}/users", &env).unwrap(), "/v2/users");
        assert_eq!(resolve_placeholders("/${missing:v1}/x", &env).unwrap(), "/v1/x");
        assert_eq!(resolve_placeholders("${missing:}", &env).unwrap(), "");
        assert_eq!(resolve_placeholders("#{dynamic}", &env).unwrap(), "#{dynamic}");
        assert_eq!(resolve_placeholders("plain", &env).unwrap(), "plain");
    }

    #[test]
    fn test_unresolvable_placeholder() {
        let env = MapEnvironment::new();
        let err = resolve_placeholders("/${nope}", &env).unwrap_err();
        assert_eq!(
            err,
            ContractError::UnresolvablePlaceholder {
                placeholder: "nope".into(),
                value: "/${nope}".into(),
            }
        );
    }
}
