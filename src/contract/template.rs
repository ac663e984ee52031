//! Compiled request templates.
//!
//! A [`RequestTemplate`] is built once per method and never mutated after
//! compilation. Call-time state lives in [`PreparedRequest`](super::prepared::PreparedRequest).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use crate::contract::annotation::{CollectionFormat, HttpMethod, TypeDescriptor};
use crate::contract::expander::Expander;

/// Ordered multimap. Keys keep insertion order and duplicate values are kept.
/// Header maps compare keys case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap {
    entries: Vec<(String, Vec<String>)>,
    case_insensitive: bool,
}

impl MultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers() -> Self {
        Self { entries: Vec::new(), case_insensitive: true }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| {
            if self.case_insensitive {
                k.eq_ignore_ascii_case(key)
            } else {
                k == key
            }
        })
    }

    /// Add one value, keeping any existing ones.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        match self.position(key) {
            Some(i) => self.entries[i].1.push(value.into()),
            None => self.entries.push((key.to_string(), vec![value.into()])),
        }
    }

    pub fn append_all<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.append(key, value);
        }
    }

    /// Replace all values of `key`. The key keeps its original position.
    pub fn replace(&mut self, key: &str, values: Vec<String>) {
        match self.position(key) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((key.to_string(), values)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|i| self.entries[i].1.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MultiMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Immutable description of one client method's request.
#[derive(Clone)]
pub struct RequestTemplate {
    pub(crate) config_key: String,
    pub(crate) method: HttpMethod,
    pub(crate) uri: String,
    pub(crate) headers: MultiMap,
    pub(crate) queries: MultiMap,
    pub(crate) body_index: Option<usize>,
    pub(crate) body_type: Option<TypeDescriptor>,
    pub(crate) index_to_name: BTreeMap<usize, Vec<String>>,
    pub(crate) index_to_expander: BTreeMap<usize, Arc<dyn Expander>>,
    pub(crate) query_map_index: Option<usize>,
    pub(crate) header_map_index: Option<usize>,
    pub(crate) form_params: Vec<String>,
    pub(crate) collection_format: CollectionFormat,
    pub(crate) decode_slash: bool,
    pub(crate) return_type: TypeDescriptor,
}

impl RequestTemplate {
    pub(crate) fn new(config_key: String) -> Self {
        Self {
            config_key,
            method: HttpMethod::Get,
            uri: String::new(),
            headers: MultiMap::headers(),
            queries: MultiMap::new(),
            body_index: None,
            body_type: None,
            index_to_name: BTreeMap::new(),
            index_to_expander: BTreeMap::new(),
            query_map_index: None,
            header_map_index: None,
            form_params: Vec::new(),
            collection_format: CollectionFormat::default(),
            decode_slash: true,
            return_type: TypeDescriptor::Unit,
        }
    }

    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path pattern, `{name}` placeholders included.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &MultiMap {
        &self.headers
    }

    pub fn queries(&self) -> &MultiMap {
        &self.queries
    }

    pub fn body_index(&self) -> Option<usize> {
        self.body_index
    }

    pub fn body_type(&self) -> Option<&TypeDescriptor> {
        self.body_type.as_ref()
    }

    pub fn index_to_name(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.index_to_name
    }

    pub fn expander(&self, index: usize) -> Option<&Arc<dyn Expander>> {
        self.index_to_expander.get(&index)
    }

    pub fn has_expander(&self, index: usize) -> bool {
        self.index_to_expander.contains_key(&index)
    }

    pub fn query_map_index(&self) -> Option<usize> {
        self.query_map_index
    }

    pub fn header_map_index(&self) -> Option<usize> {
        self.header_map_index
    }

    pub fn form_params(&self) -> &[String] {
        &self.form_params
    }

    pub fn collection_format(&self) -> CollectionFormat {
        self.collection_format
    }

    pub fn decode_slash(&self) -> bool {
        self.decode_slash
    }

    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    /// Whether `{name}` appears in the path, a query or a header.
    pub fn references(&self, name: &str) -> bool {
        let needle = format!("{{{}}}", name);
        self.uri.contains(&needle)
            || self.queries.iter().any(|(_, vs)| vs.iter().any(|v| v.contains(&needle)))
            || self.headers.iter().any(|(_, vs)| vs.iter().any(|v| v.contains(&needle)))
    }

    pub(crate) fn append_path(&mut self, segment: &str) {
        self.uri.push_str(segment);
    }

    pub(crate) fn bind_name(&mut self, index: usize, name: &str) {
        let names = self.index_to_name.entry(index).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
}

impl fmt::Debug for RequestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTemplate")
            .field("config_key", &self.config_key)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("queries", &self.queries)
            .field("body_index", &self.body_index)
            .field("expanders", &self.index_to_expander.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Serialize for RequestTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let expanders: Vec<&usize> = self.index_to_expander.keys().collect();
        let mut s = serializer.serialize_struct("RequestTemplate", 11)?;
        s.serialize_field("config_key", &self.config_key)?;
        s.serialize_field("method", &self.method)?;
        s.serialize_field("uri", &self.uri)?;
        s.serialize_field("headers", &self.headers)?;
        s.serialize_field("queries", &self.queries)?;
        s.serialize_field("body_index", &self.body_index)?;
        s.serialize_field("index_to_name", &self.index_to_name)?;
        s.serialize_field("expanders", &expanders)?;
        s.serialize_field("query_map_index", &self.query_map_index)?;
        s.serialize_field("header_map_index", &self.header_map_index)?;
        s.serialize_field("collection_format", &self.collection_format)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multimap_preserves_duplicates_and_order() {
        let mut map = MultiMap::headers();
        map.append("X-A", "1");
        map.append("Accept", "json");
        map.append("x-a", "2");
        assert_eq!(map.get("X-A").unwrap(), &["1".to_string(), "2".to_string()]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["X-A", "Accept"]);

        map.replace("ACCEPT", vec!["xml".into()]);
        assert_eq!(map.first("accept"), Some("xml"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_query_map_is_case_sensitive() {
        let mut map = MultiMap::new();
        map.append("a", "1");
        map.append("A", "2");
        assert_eq!(map.len(), 2);
        assert!(map.remove("a").is_some());
        assert!(!map.contains_key("a"));
    }

    #[test]
    fn test_references() {
        let mut template = RequestTemplate::new("A#b()".into());
        template.append_path("/users/{id}");
        template.queries.append("q", "{term}");
        template.headers.append("X-Trace", "{trace}");
        assert!(template.references("id"));
        assert!(template.references("term"));
        assert!(template.references("trace"));
        assert!(!template.references("other"));
    }
}
