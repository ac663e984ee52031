//! Encoders, decoders and error decoders.
//!
//! # Design Decisions
//! - JSON is the default wire format; strings and bytes pass through untouched
//! - Form parameters become `application/x-www-form-urlencoded` unless the
//!   method consumes `multipart/form-data`
//! - The default error decoder only marks a response retryable when the
//!   server sends `Retry-After`

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use serde_json::{Map, Value};
use crate::contract::compiler::CONTENT_TYPE;
use crate::contract::expander::scalar_to_string;
use crate::contract::{PreparedRequest, TypeDescriptor};
use crate::error::InvocationFault;
use crate::transport::Response;

/// Writes a body value into the request.
pub trait Encoder: Send + Sync + fmt::Debug {
    fn encode(
        &self,
        value: &Value,
        body_type: Option<&TypeDescriptor>,
        request: &mut PreparedRequest,
    ) -> Result<(), InvocationFault>;
}

/// Reads a successful response into a value of the declared return type.
pub trait Decoder: Send + Sync + fmt::Debug {
    fn decode(&self, response: &Response, ty: &TypeDescriptor) -> Result<Value, InvocationFault>;
}

/// Maps a non-2xx response to a fault.
pub trait ErrorDecoder: Send + Sync + fmt::Debug {
    fn decode(&self, method_key: &str, response: &Response) -> InvocationFault;
}

/// Produces an error decoder for a client type.
pub trait ErrorDecoderFactory: Send + Sync {
    fn create(&self, type_name: &str) -> Arc<dyn ErrorDecoder>;
}

/// Turns a query map argument into name/value pairs.
pub trait QueryMapEncoder: Send + Sync + fmt::Debug {
    fn encode(&self, value: &Value) -> Result<Map<String, Value>, String>;
}

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(
        &self,
        value: &Value,
        body_type: Option<&TypeDescriptor>,
        request: &mut PreparedRequest,
    ) -> Result<(), InvocationFault> {
        let content_type = request.headers.first(CONTENT_TYPE).map(str::to_ascii_lowercase);

        if content_type.as_deref().is_some_and(|ct| ct.starts_with(FORM_URLENCODED)) {
            let Value::Object(fields) = value else {
                return Err(InvocationFault::Encode(format!("form body must be a map, got {}", value)));
            };
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (name, field) in fields {
                let values = match field {
                    Value::Array(items) => items.iter().collect::<Vec<_>>(),
                    other => vec![other],
                };
                for v in values.into_iter().filter(|v| !v.is_null()) {
                    serializer.append_pair(name, &scalar_to_string(v).map_err(InvocationFault::Encode)?);
                }
            }
            request.body = Some(Bytes::from(serializer.finish()));
            return Ok(());
        }

        if content_type.as_deref().is_some_and(|ct| ct.starts_with(MULTIPART_FORM_DATA)) {
            let Value::Object(parts) = value else {
                return Err(InvocationFault::Encode(format!("multipart body must be a map, got {}", value)));
            };
            let boundary = format!("{:032x}", rand::random::<u128>());
            request.headers.replace(
                CONTENT_TYPE,
                vec![format!("{}; boundary={}", MULTIPART_FORM_DATA, boundary)],
            );
            request.body = Some(encode_multipart(parts, &boundary)?);
            return Ok(());
        }

        let body = match (body_type, value) {
            (Some(TypeDescriptor::String), Value::String(text)) => {
                if content_type.is_none() {
                    request.headers.append(CONTENT_TYPE, "text/plain; charset=utf-8");
                }
                Bytes::from(text.clone())
            }
            _ => {
                if content_type.is_none() {
                    let ct = if self.is_form_body(body_type, request) { FORM_URLENCODED } else { "application/json" };
                    request.headers.append(CONTENT_TYPE, ct);
                    if ct == FORM_URLENCODED {
                        return self.encode(value, body_type, request);
                    }
                }
                let encoded = serde_json::to_vec(value).map_err(|e| InvocationFault::Encode(e.to_string()))?;
                Bytes::from(encoded)
            }
        };
        request.body = Some(body);
        Ok(())
    }
}

impl JsonEncoder {
    /// Form parameters without a declared body default to a urlencoded form.
    fn is_form_body(&self, body_type: Option<&TypeDescriptor>, request: &PreparedRequest) -> bool {
        body_type.is_none() && request.body_value.as_ref().is_some_and(Value::is_object)
    }
}

fn encode_multipart(parts: &Map<String, Value>, boundary: &str) -> Result<Bytes, InvocationFault> {
    let mut out = String::new();
    for (name, value) in parts.iter().filter(|(_, v)| !v.is_null()) {
        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n", name));
        match value {
            Value::Object(_) | Value::Array(_) => {
                let json = serde_json::to_string(value).map_err(|e| InvocationFault::Encode(e.to_string()))?;
                out.push_str("Content-Type: application/json\r\n\r\n");
                out.push_str(&json);
            }
            scalar => {
                out.push_str("\r\n");
                out.push_str(&scalar_to_string(scalar).map_err(InvocationFault::Encode)?);
            }
        }
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{}--\r\n", boundary));
    Ok(Bytes::from(out))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, response: &Response, ty: &TypeDescriptor) -> Result<Value, InvocationFault> {
        match ty {
            TypeDescriptor::Unit => return Ok(Value::Null),
            TypeDescriptor::String => return Ok(Value::String(response.body_text())),
            TypeDescriptor::Bytes => {
                return Ok(Value::Array(response.body.iter().map(|b| Value::from(*b)).collect()))
            }
            _ => {}
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body).map_err(|e| InvocationFault::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorDecoder;

impl ErrorDecoder for DefaultErrorDecoder {
    fn decode(&self, method_key: &str, response: &Response) -> InvocationFault {
        let fault = InvocationFault::Status {
            status: response.status,
            method_key: method_key.to_string(),
            body: response.body_text(),
        };
        match response.headers.first("Retry-After").and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(seconds) => InvocationFault::retryable(fault, Some(Duration::from_secs(seconds))),
            None => fault,
        }
    }
}

/// Uses the fields of an object argument as query parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldQueryMapEncoder;

impl QueryMapEncoder for FieldQueryMapEncoder {
    fn encode(&self, value: &Value) -> Result<Map<String, Value>, String> {
        match value {
            Value::Object(fields) => Ok(fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            other => Err(format!("query map argument must be an object, got {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{HttpMethod, MultiMap};
    use crate::transport::Request;
    use serde_json::json;

    fn prepared() -> PreparedRequest {
        PreparedRequest {
            config_key: "Api#m()".into(),
            method: HttpMethod::Post,
            path: "/x".into(),
            queries: MultiMap::new(),
            headers: MultiMap::headers(),
            body_value: None,
            body: None,
        }
    }

    fn response(status: u16, body: &str) -> Response {
        Response {
            status,
            headers: MultiMap::headers(),
            body: Bytes::from(body.to_string()),
            request: Request::new(HttpMethod::Get, "http://svc/x"),
        }
    }

    #[test]
    fn test_json_encoder() {
        let mut request = prepared();
        let value = json!({"name": "ann"});
        JsonEncoder.encode(&value, Some(&TypeDescriptor::Named("User".into())), &mut request).unwrap();
        assert_eq!(request.headers.first("content-type"), Some("application/json"));
        assert_eq!(request.body.unwrap(), Bytes::from_static(br#"{"name":"ann"}"#));
    }

    #[test]
    fn test_form_encoding() {
        let mut request = prepared();
        let value = json!({"user": "ann", "tags": ["a b", "c"]});
        request.body_value = Some(value.clone());
        JsonEncoder.encode(&value, None, &mut request).unwrap();
        assert_eq!(request.headers.first(CONTENT_TYPE), Some(FORM_URLENCODED));
        assert_eq!(request.body.unwrap(), Bytes::from_static(b"tags=a+b&tags=c&user=ann"));
    }

    #[test]
    fn test_multipart_encoding() {
        let mut request = prepared();
        request.headers.append(CONTENT_TYPE, "multipart/form-data");
        JsonEncoder
            .encode(&json!({"name": "report", "meta": {"v": 1}}), None, &mut request)
            .unwrap();
        let content_type = request.headers.first(CONTENT_TYPE).unwrap().to_string();
        let boundary = content_type.split("boundary=").nth(1).unwrap();
        let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("name=\"name\"\r\n\r\nreport\r\n"));
        assert!(body.contains("Content-Type: application/json\r\n\r\n{\"v\":1}"));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_string_body_passes_through() {
        let mut request = prepared();
        JsonEncoder.encode(&json!("raw text"), Some(&TypeDescriptor::String), &mut request).unwrap();
        assert_eq!(request.body.unwrap(), Bytes::from_static(b"raw text"));
    }

    #[test]
    fn test_json_decoder() {
        let user = TypeDescriptor::Named("User".into());
        assert_eq!(JsonDecoder.decode(&response(200, r#"{"id":1}"#), &user).unwrap(), json!({"id": 1}));
        assert_eq!(JsonDecoder.decode(&response(200, ""), &user).unwrap(), Value::Null);
        assert_eq!(JsonDecoder.decode(&response(200, "hi"), &TypeDescriptor::String).unwrap(), json!("hi"));
        assert!(matches!(
            JsonDecoder.decode(&response(200, "{oops"), &user),
            Err(InvocationFault::Decode(_))
        ));
    }

    #[test]
    fn test_default_error_decoder() {
        let fault = DefaultErrorDecoder.decode("Api#m()", &response(500, "boom"));
        assert!(matches!(fault, InvocationFault::Status { status: 500, ref body, .. } if body == "boom"));

        let mut throttled = response(503, "");
        throttled.headers.append("Retry-After", "2");
        let fault = DefaultErrorDecoder.decode("Api#m()", &throttled);
        assert!(fault.is_retryable());
        assert_eq!(fault.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_field_query_map_encoder() {
        let encoded = FieldQueryMapEncoder.encode(&json!({"a": 1, "b": null})).unwrap();
        assert_eq!(encoded.len(), 1);
        assert!(FieldQueryMapEncoder.encode(&json!([1])).is_err());
    }
}
