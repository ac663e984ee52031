//! Interface metadata.
//!
//! Client interfaces are described as plain data: a type name, the methods it
//! declares and, per method, the routing annotation plus the annotations on
//! each parameter. Everything derives serde so interfaces can be declared in
//! code or loaded from a manifest.

use std::borrow::Cow;
use std::fmt;
use serde::{Deserialize, Serialize};

/// HTTP verb of a request mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Head => http::Method::HEAD,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Options => http::Method::OPTIONS,
            HttpMethod::Trace => http::Method::TRACE,
        }
    }
}

/// Routing annotation on a method.
///
/// `method` and `path` are lists because the annotation allows several
/// values; the compiler rejects anything but zero/one verbs and exactly one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestMapping {
    pub method: Vec<HttpMethod>,
    pub path: Vec<String>,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
    /// `key=value` entries.
    pub headers: Vec<String>,
}

impl RequestMapping {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method: vec![method],
            path: vec![path.to_string()],
            ..Default::default()
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn produces(mut self, value: &str) -> Self {
        self.produces.push(value.to_string());
        self
    }

    pub fn consumes(mut self, value: &str) -> Self {
        self.consumes.push(value.to_string());
        self
    }

    pub fn header(mut self, entry: &str) -> Self {
        self.headers.push(entry.to_string());
        self
    }
}

/// How multi-valued query parameters are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionFormat {
    /// `a=1,2`
    Csv,
    /// `a=1 2`
    Ssv,
    /// `a=1\t2`
    Tsv,
    /// `a=1|2`
    Pipes,
    /// `a=1&a=2`
    #[default]
    Exploded,
}

impl CollectionFormat {
    pub fn separator(&self) -> Option<&'static str> {
        match self {
            CollectionFormat::Csv => Some(","),
            CollectionFormat::Ssv => Some(" "),
            CollectionFormat::Tsv => Some("\t"),
            CollectionFormat::Pipes => Some("|"),
            CollectionFormat::Exploded => None,
        }
    }
}

/// Annotation attached to a method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum MethodAnnotation {
    RequestMapping(RequestMapping),
    CollectionFormat { format: CollectionFormat },
}

/// Name of a parameter annotation kind; processors are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AnnotationKind(pub Cow<'static, str>);

impl AnnotationKind {
    pub const PATH_VARIABLE: AnnotationKind = AnnotationKind(Cow::Borrowed("PathVariable"));
    pub const REQUEST_PARAM: AnnotationKind = AnnotationKind(Cow::Borrowed("RequestParam"));
    pub const REQUEST_HEADER: AnnotationKind = AnnotationKind(Cow::Borrowed("RequestHeader"));
    pub const QUERY_MAP: AnnotationKind = AnnotationKind(Cow::Borrowed("QueryMap"));
    pub const REQUEST_PART: AnnotationKind = AnnotationKind(Cow::Borrowed("RequestPart"));
    pub const MATRIX_VARIABLE: AnnotationKind = AnnotationKind(Cow::Borrowed("MatrixVariable"));

    pub fn custom(name: impl Into<String>) -> Self {
        AnnotationKind(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Annotation attached to a parameter. An empty `value` means the name was omitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParamAnnotation {
    pub kind: AnnotationKind,
    #[serde(default)]
    pub value: String,
}

impl ParamAnnotation {
    pub fn new(kind: AnnotationKind, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }

    pub fn path_variable(value: &str) -> Self {
        Self::new(AnnotationKind::PATH_VARIABLE, value)
    }

    pub fn request_param(value: &str) -> Self {
        Self::new(AnnotationKind::REQUEST_PARAM, value)
    }

    pub fn request_header(value: &str) -> Self {
        Self::new(AnnotationKind::REQUEST_HEADER, value)
    }

    pub fn query_map() -> Self {
        Self::new(AnnotationKind::QUERY_MAP, "")
    }

    pub fn request_part(value: &str) -> Self {
        Self::new(AnnotationKind::REQUEST_PART, value)
    }

    pub fn matrix_variable(value: &str) -> Self {
        Self::new(AnnotationKind::MATRIX_VARIABLE, value)
    }
}

/// Declared type of a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "type", content = "of", rename_all = "lowercase")]
pub enum TypeDescriptor {
    String,
    Integer,
    Float,
    Boolean,
    Enum(String),
    /// Any user type; convertible only if a converter is registered for it.
    Named(String),
    List(Box<TypeDescriptor>),
    Map,
    Bytes,
    Unit,
}

impl TypeDescriptor {
    pub fn list_of(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    /// Element type for collections, the type itself otherwise.
    pub fn element(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::List(inner) => inner,
            other => other,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, TypeDescriptor::Map)
    }

    /// Short name used in configuration keys.
    pub fn simple_name(&self) -> String {
        match self {
            TypeDescriptor::String => "String".into(),
            TypeDescriptor::Integer => "Integer".into(),
            TypeDescriptor::Float => "Float".into(),
            TypeDescriptor::Boolean => "Boolean".into(),
            TypeDescriptor::Enum(name) | TypeDescriptor::Named(name) => {
                simple_type_name(name).to_string()
            }
            TypeDescriptor::List(inner) => format!("List<{}>", inner.simple_name()),
            TypeDescriptor::Map => "Map".into(),
            TypeDescriptor::Bytes => "Bytes".into(),
            TypeDescriptor::Unit => "Unit".into(),
        }
    }
}

/// Whether a referenced type is an interface or a concrete implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Interface,
    Concrete,
}

/// Reference to a type by name, used for fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
}

impl TypeRef {
    pub fn concrete(name: &str) -> Self {
        Self { name: name.to_string(), kind: TypeKind::Concrete }
    }

    pub fn interface(name: &str) -> Self {
        Self { name: name.to_string(), kind: TypeKind::Interface }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParamMeta {
    /// Source name; `None` when the name is not retained.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub annotations: Vec<ParamAnnotation>,
}

impl ParamMeta {
    pub fn new(name: &str, ty: TypeDescriptor) -> Self {
        Self { name: Some(name.to_string()), ty, annotations: Vec::new() }
    }

    pub fn unnamed(ty: TypeDescriptor) -> Self {
        Self { name: None, ty, annotations: Vec::new() }
    }

    pub fn annotated(mut self, annotation: ParamAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MethodMeta {
    pub name: String,
    #[serde(default)]
    pub annotations: Vec<MethodAnnotation>,
    #[serde(default)]
    pub params: Vec<ParamMeta>,
    #[serde(default = "unit_type")]
    pub returns: TypeDescriptor,
}

fn unit_type() -> TypeDescriptor {
    TypeDescriptor::Unit
}

impl MethodMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            annotations: Vec::new(),
            params: Vec::new(),
            returns: TypeDescriptor::Unit,
        }
    }

    pub fn mapping(mut self, mapping: RequestMapping) -> Self {
        self.annotations.push(MethodAnnotation::RequestMapping(mapping));
        self
    }

    pub fn collection_format(mut self, format: CollectionFormat) -> Self {
        self.annotations.push(MethodAnnotation::CollectionFormat { format });
        self
    }

    pub fn param(mut self, param: ParamMeta) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: TypeDescriptor) -> Self {
        self.returns = ty;
        self
    }

    pub fn request_mapping(&self) -> Option<&RequestMapping> {
        self.annotations.iter().find_map(|a| match a {
            MethodAnnotation::RequestMapping(m) => Some(m),
            _ => None,
        })
    }

    pub fn collection_format_annotation(&self) -> Option<CollectionFormat> {
        self.annotations.iter().find_map(|a| match a {
            MethodAnnotation::CollectionFormat { format } => Some(*format),
            _ => None,
        })
    }

    /// Canonical key: `Simple#method(T1,T2)`.
    pub fn config_key(&self, type_name: &str) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.simple_name()).collect();
        format!("{}#{}({})", simple_type_name(type_name), self.name, params.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InterfaceMeta {
    pub type_name: String,
    #[serde(default)]
    pub kind: TypeKind,
    /// Routing declared on the interface itself. Always rejected by the compiler.
    #[serde(default)]
    pub request_mapping: Option<RequestMapping>,
    #[serde(default)]
    pub methods: Vec<MethodMeta>,
}

impl InterfaceMeta {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            kind: TypeKind::Interface,
            request_mapping: None,
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }

    pub fn simple_name(&self) -> &str {
        simple_type_name(&self.type_name)
    }
}

/// Last segment of a `::` or `.` separated path.
pub fn simple_type_name(name: &str) -> &str {
    let after_colons = name.rsplit("::").next().unwrap_or(name);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_key() {
        let method = MethodMeta::new("find")
            .param(ParamMeta::new("id", TypeDescriptor::Integer))
            .param(ParamMeta::new("tags", TypeDescriptor::list_of(TypeDescriptor::String)));
        assert_eq!(
            method.config_key("com.acme.UserClient"),
            "UserClient#find(Integer,List<String>)"
        );
        assert_eq!(MethodMeta::new("ping").config_key("acme::Ping"), "Ping#ping()");
    }

    #[test]
    fn test_deserialize_interface() {
        let src = r#"
            type_name = "acme::Users"

            [[methods]]
            name = "get"
            returns = { type = "named", of = "User" }

            [[methods.annotations]]
            kind = "RequestMapping"
            method = ["GET"]
            path = ["/users/{id}"]

            [[methods.params]]
            name = "id"
            type = { type = "integer" }
            annotations = [{ kind = "PathVariable", value = "id" }]
        "#;
        let iface: InterfaceMeta = toml::from_str(src).unwrap();
        assert_eq!(iface.kind, TypeKind::Interface);
        let method = &iface.methods[0];
        let mapping = method.request_mapping().unwrap();
        assert_eq!(mapping.method, vec![HttpMethod::Get]);
        assert_eq!(method.params[0].annotations[0].kind, AnnotationKind::PATH_VARIABLE);
        assert_eq!(method.returns, TypeDescriptor::Named("User".into()));
    }

    #[test]
    fn test_element_type() {
        let list = TypeDescriptor::list_of(TypeDescriptor::Integer);
        assert_eq!(list.element(), &TypeDescriptor::Integer);
        assert_eq!(TypeDescriptor::Map.element(), &TypeDescriptor::Map);
    }
}
