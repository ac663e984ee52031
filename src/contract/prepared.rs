//! Call-time expansion of a [`RequestTemplate`].
//!
//! # Data Flow
//! ```text
//! args (JSON values)
//!     → variables: index_to_name + expanders
//!     → path / query / header substitution
//!     → query map / header map merge
//!     → body value (body parameter or form parameters)
//!     → PreparedRequest (mutable, seen by interceptors)
//! ```
//!
//! # Design Decisions
//! - Null arguments are undefined: their placeholders expand to nothing
//! - A query or header value whose placeholders are all undefined is dropped
//! - Repeated values follow the template's collection format

use std::collections::HashMap;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};
use crate::contract::annotation::{CollectionFormat, HttpMethod};
use crate::contract::expander::scalar_to_string;
use crate::contract::template::{MultiMap, RequestTemplate};
use crate::error::InvocationFault;

/// A request being assembled for one call.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedRequest {
    pub config_key: String,
    pub method: HttpMethod,
    /// Expanded and encoded path, empty or starting with `/`.
    pub path: String,
    pub queries: MultiMap,
    pub headers: MultiMap,
    /// Value handed to the encoder.
    pub body_value: Option<Value>,
    /// Encoded body.
    #[serde(skip)]
    pub body: Option<Bytes>,
}

impl PreparedRequest {
    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    pub fn query(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.queries.append(name, value);
        self
    }

    /// Absolute URL under `base`.
    pub fn url(&self, base: &str) -> String {
        let mut url = base.trim_end_matches('/').to_string();
        url.push_str(&self.path);
        if !self.queries.is_empty() {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, values) in self.queries.iter() {
                for value in values {
                    serializer.append_pair(key, value);
                }
            }
            url.push('?');
            url.push_str(&serializer.finish());
        }
        url
    }
}

impl RequestTemplate {
    /// Resolve this template against call arguments.
    pub fn expand(&self, args: &[Value]) -> Result<PreparedRequest, InvocationFault> {
        let variables = self.variables(args)?;

        let mut path = substitute_path(&self.uri, &variables);
        if self.decode_slash {
            path = path.replace("%2F", "/");
        }

        let mut queries = expand_multimap(&self.queries, &variables, self.collection_format, MultiMap::new());
        let mut headers =
            expand_multimap(&self.headers, &variables, self.collection_format, MultiMap::headers());

        if let Some(index) = self.query_map_index {
            merge_map_argument(index, args.get(index), &mut queries, self.collection_format)?;
        }
        if let Some(index) = self.header_map_index {
            merge_map_argument(index, args.get(index), &mut headers, self.collection_format)?;
        }

        let body_value = match self.body_index {
            Some(index) => args.get(index).filter(|v| !v.is_null()).cloned(),
            None if !self.form_params.is_empty() => self.form_body(args),
            None => None,
        };

        Ok(PreparedRequest {
            config_key: self.config_key.clone(),
            method: self.method,
            path,
            queries,
            headers,
            body_value,
            body: None,
        })
    }

    fn variables(&self, args: &[Value]) -> Result<HashMap<&str, Vec<String>>, InvocationFault> {
        let mut variables = HashMap::new();
        for (&index, names) in &self.index_to_name {
            let Some(value) = args.get(index).filter(|v| !v.is_null()) else {
                continue;
            };
            let rendered = match self.index_to_expander.get(&index) {
                Some(expander) => expander.expand_all(value),
                None => default_expand(value),
            }
            .map_err(|reason| InvocationFault::Expansion { index, reason })?;
            if rendered.is_empty() {
                continue;
            }
            for name in names {
                variables.insert(name.as_str(), rendered.clone());
            }
        }
        Ok(variables)
    }

    fn form_body(&self, args: &[Value]) -> Option<Value> {
        let mut form = Map::new();
        for (&index, names) in &self.index_to_name {
            let Some(value) = args.get(index).filter(|v| !v.is_null()) else {
                continue;
            };
            for name in names.iter().filter(|n| self.form_params.contains(n)) {
                form.insert(name.clone(), value.clone());
            }
        }
        (!form.is_empty()).then_some(Value::Object(form))
    }
}

fn default_expand(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
            .collect(),
        other => scalar_to_string(other).map(|s| vec![s]),
    }
}

/// Everything but the characters allowed unescaped in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Walk `{name}` placeholders, calling `resolve` for each one.
fn substitute<F>(pattern: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&resolve(&rest[start + 1..start + len]));
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

fn placeholders(pattern: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        names.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    names
}

fn substitute_path(uri: &str, variables: &HashMap<&str, Vec<String>>) -> String {
    substitute(uri, |name| match variables.get(name) {
        Some(values) => values
            .iter()
            .map(|v| utf8_percent_encode(v, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join(","),
        None => String::new(),
    })
}

fn expand_multimap(
    source: &MultiMap,
    variables: &HashMap<&str, Vec<String>>,
    format: CollectionFormat,
    mut out: MultiMap,
) -> MultiMap {
    for (key, templates) in source.iter() {
        let mut expanded = Vec::new();
        for template in templates {
            let names = placeholders(template);
            if names.is_empty() {
                expanded.push(template.clone());
                continue;
            }
            if names.iter().all(|n| !variables.contains_key(n)) {
                continue;
            }
            // a bare `{name}` fans out to one value per element
            if names.len() == 1 && template.len() == names[0].len() + 2 {
                let values = &variables[names[0]];
                match format.separator() {
                    Some(sep) => expanded.push(values.join(sep)),
                    None => expanded.extend(values.iter().cloned()),
                }
                continue;
            }
            let sep = format.separator().unwrap_or(",");
            expanded.push(substitute(template, |name| {
                variables.get(name).map(|v| v.join(sep)).unwrap_or_default()
            }));
        }
        if !expanded.is_empty() {
            out.append_all(key, expanded);
        }
    }
    out
}

fn merge_map_argument(
    index: usize,
    arg: Option<&Value>,
    target: &mut MultiMap,
    format: CollectionFormat,
) -> Result<(), InvocationFault> {
    let entries = match arg {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            return Err(InvocationFault::Expansion {
                index,
                reason: format!("expected a map, got {}", other),
            })
        }
    };
    for (key, value) in entries {
        let values = default_expand(value).map_err(|reason| InvocationFault::Expansion { index, reason })?;
        if values.is_empty() {
            continue;
        }
        match format.separator() {
            Some(sep) => target.append(key, values.join(sep)),
            None => target.append_all(key, values),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::contract::expander::MatrixExpander;
    use serde_json::json;

    fn template(uri: &str) -> RequestTemplate {
        let mut t = RequestTemplate::new("Api#call()".into());
        t.append_path(uri);
        t
    }

    #[test]
    fn test_expand_path_and_query() {
        let mut t = template("/users/{id}/files/{path}");
        t.bind_name(0, "id");
        t.bind_name(1, "path");
        t.bind_name(2, "q");
        t.queries.append("q", "{q}");
        t.queries.append("fixed", "1");

        let prepared = t.expand(&[json!(7), json!("a/b c"), json!("x y")]).unwrap();
        assert_eq!(prepared.path, "/users/7/files/a/b%20c");
        assert_eq!(prepared.url("http://svc/"), "http://svc/users/7/files/a/b%20c?q=x+y&fixed=1");
    }

    #[test]
    fn test_slash_kept_encoded_when_not_decoding() {
        let mut t = template("/files/{path}");
        t.decode_slash = false;
        t.bind_name(0, "path");
        let prepared = t.expand(&[json!("a/b")]).unwrap();
        assert_eq!(prepared.path, "/files/a%2Fb");

        let prepared = t.expand(&[json!("ä?#~@")]).unwrap();
        assert_eq!(prepared.path, "/files/%C3%A4%3F%23~@");
    }

    #[test]
    fn test_null_drops_query_and_header() {
        let mut t = template("/search");
        t.bind_name(0, "q");
        t.bind_name(1, "trace");
        t.queries.append("q", "{q}");
        t.headers.append("X-Trace", "{trace}");
        let prepared = t.expand(&[Value::Null, Value::Null]).unwrap();
        assert!(prepared.queries.is_empty());
        assert!(prepared.headers.is_empty());
        assert_eq!(prepared.url("http://svc"), "http://svc/search");
    }

    #[test]
    fn test_collection_format() {
        let mut t = template("/items");
        t.bind_name(0, "id");
        t.queries.append("id", "{id}");

        let exploded = t.expand(&[json!([1, 2])]).unwrap();
        assert_eq!(exploded.queries.get("id").unwrap(), &["1".to_string(), "2".to_string()]);

        t.collection_format = CollectionFormat::Csv;
        let csv = t.expand(&[json!([1, 2])]).unwrap();
        assert_eq!(csv.queries.get("id").unwrap(), &["1,2".to_string()]);

        t.collection_format = CollectionFormat::Pipes;
        let pipes = t.expand(&[json!([1, 2])]).unwrap();
        assert_eq!(pipes.queries.get("id").unwrap(), &["1|2".to_string()]);
    }

    #[test]
    fn test_query_map_and_header_map() {
        let mut t = template("/q");
        t.query_map_index = Some(0);
        t.header_map_index = Some(1);
        let prepared = t
            .expand(&[json!({"a": 1, "b": ["x", "y"], "c": null}), json!({"X-Tenant": "acme"})])
            .unwrap();
        assert_eq!(prepared.queries.get("a").unwrap(), &["1".to_string()]);
        assert_eq!(prepared.queries.get("b").unwrap().len(), 2);
        assert!(!prepared.queries.contains_key("c"));
        assert_eq!(prepared.headers.first("x-tenant"), Some("acme"));

        let nulls = t.expand(&[json!({"c": null}), json!({"X-Empty": null})]).unwrap();
        assert!(nulls.queries.is_empty());
        assert!(nulls.headers.is_empty());

        let err = t.expand(&[json!(3), Value::Null]).unwrap_err();
        assert!(matches!(err, InvocationFault::Expansion { index: 0, .. }));
    }

    #[test]
    fn test_body_and_form_params() {
        let mut t = template("/users");
        t.body_index = Some(0);
        let prepared = t.expand(&[json!({"name": "ann"})]).unwrap();
        assert_eq!(prepared.body_value, Some(json!({"name": "ann"})));

        let mut form = template("/login");
        form.bind_name(0, "user");
        form.bind_name(1, "password");
        form.form_params = vec!["user".into(), "password".into()];
        let prepared = form.expand(&[json!("ann"), json!("s3cret")]).unwrap();
        assert_eq!(prepared.body_value, Some(json!({"user": "ann", "password": "s3cret"})));
    }

    #[test]
    fn test_matrix_expander_output_is_not_escaped() {
        let mut t = template("/cars{color}");
        t.bind_name(0, "color");
        t.index_to_expander.insert(0, Arc::new(MatrixExpander::new("color")));
        let prepared = t.expand(&[json!(["red", "blue"])]).unwrap();
        assert_eq!(prepared.path, "/cars;color=red,blue");
    }
}
