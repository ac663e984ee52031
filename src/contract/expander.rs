//! Parameter expansion.
//!
//! An expander turns one argument value into the string substituted for its
//! placeholder. The compiler attaches a [`ConvertingExpander`] when the
//! active [`ConversionService`] can stringify the parameter type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use serde_json::Value;
use crate::contract::annotation::TypeDescriptor;

/// Turns an argument into its template string.
pub trait Expander: Send + Sync + fmt::Debug {
    fn expand(&self, value: &Value) -> Result<String, String>;

    /// Expand an argument into its values. Arrays expand element by element.
    fn expand_all(&self, value: &Value) -> Result<Vec<String>, String> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| self.expand(v))
                .collect(),
            other => self.expand(other).map(|s| vec![s]),
        }
    }
}

/// Converter for a single named type.
pub type Converter = Arc<dyn Fn(&Value) -> Result<String, String> + Send + Sync>;

/// Decides whether a type can be rendered as a string and renders it.
pub trait ConversionService: Send + Sync {
    fn can_convert(&self, ty: &TypeDescriptor) -> bool;
    fn convert(&self, ty: &TypeDescriptor, value: &Value) -> Result<String, String>;
}

/// Scalars and enums convert out of the box. Named types need a registered converter.
#[derive(Clone, Default)]
pub struct DefaultConversionService {
    converters: HashMap<String, Converter>,
}

impl fmt::Debug for DefaultConversionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultConversionService")
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DefaultConversionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter<F>(mut self, type_name: &str, converter: F) -> Self
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        self.converters.insert(type_name.to_string(), Arc::new(converter));
        self
    }
}

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, ty: &TypeDescriptor) -> bool {
        match ty {
            TypeDescriptor::String
            | TypeDescriptor::Integer
            | TypeDescriptor::Float
            | TypeDescriptor::Boolean
            | TypeDescriptor::Enum(_) => true,
            TypeDescriptor::Named(name) => self.converters.contains_key(name),
            TypeDescriptor::List(inner) => self.can_convert(inner),
            TypeDescriptor::Map | TypeDescriptor::Bytes | TypeDescriptor::Unit => false,
        }
    }

    fn convert(&self, ty: &TypeDescriptor, value: &Value) -> Result<String, String> {
        match ty.element() {
            TypeDescriptor::Named(name) => match self.converters.get(name) {
                Some(converter) => converter(value),
                None => Err(format!("no converter registered for {}", name)),
            },
            _ => scalar_to_string(value),
        }
    }
}

/// Default rendering for values without an expander.
pub fn scalar_to_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(format!("cannot render {} as a string", other)),
    }
}

/// Delegates to a conversion service for one declared type.
pub struct ConvertingExpander {
    ty: TypeDescriptor,
    service: Arc<dyn ConversionService>,
}

impl ConvertingExpander {
    pub fn new(ty: TypeDescriptor, service: Arc<dyn ConversionService>) -> Self {
        Self { ty, service }
    }
}

impl fmt::Debug for ConvertingExpander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertingExpander").field("ty", &self.ty).finish()
    }
}

impl Expander for ConvertingExpander {
    fn expand(&self, value: &Value) -> Result<String, String> {
        self.service.convert(&self.ty, value)
    }
}

/// Renders a matrix variable: `;name=v1,v2` for lists, `;k=v;k2=v2` for maps.
#[derive(Debug, Clone)]
pub struct MatrixExpander {
    name: String,
}

impl MatrixExpander {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl Expander for MatrixExpander {
    fn expand_all(&self, value: &Value) -> Result<Vec<String>, String> {
        self.expand(value).map(|s| vec![s])
    }

    fn expand(&self, value: &Value) -> Result<String, String> {
        match value {
            Value::Object(entries) => {
                let mut out = String::new();
                for (k, v) in entries {
                    out.push(';');
                    out.push_str(k);
                    out.push('=');
                    out.push_str(&scalar_to_string(v)?);
                }
                Ok(out)
            }
            Value::Array(items) => {
                let rendered = items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!(";{}={}", self.name, rendered.join(",")))
            }
            other => Ok(format!(";{}={}", self.name, scalar_to_string(other)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_can_convert() {
        let service = DefaultConversionService::new()
            .with_converter("Money", |v| Ok(format!("{}EUR", v)));
        assert!(service.can_convert(&TypeDescriptor::Integer));
        assert!(service.can_convert(&TypeDescriptor::Enum("Color".into())));
        assert!(service.can_convert(&TypeDescriptor::list_of(TypeDescriptor::String)));
        assert!(service.can_convert(&TypeDescriptor::Named("Money".into())));
        assert!(!service.can_convert(&TypeDescriptor::Named("User".into())));
        assert!(!service.can_convert(&TypeDescriptor::Map));
        assert!(!service.can_convert(&TypeDescriptor::list_of(TypeDescriptor::Map)));
    }

    #[test]
    fn test_converting_expander() {
        let service: Arc<dyn ConversionService> = Arc::new(
            DefaultConversionService::new().with_converter("Money", |v| Ok(format!("{}EUR", v))),
        );
        let money = ConvertingExpander::new(TypeDescriptor::Named("Money".into()), service.clone());
        assert_eq!(money.expand(&json!(5)).unwrap(), "5EUR");

        let int = ConvertingExpander::new(TypeDescriptor::Integer, service);
        assert_eq!(int.expand(&json!(42)).unwrap(), "42");
        assert!(int.expand(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_matrix_expander() {
        let expander = MatrixExpander::new("color");
        assert_eq!(expander.expand(&json!(["red", "blue"])).unwrap(), ";color=red,blue");
        assert_eq!(expander.expand(&json!("red")).unwrap(), ";color=red");
        assert_eq!(expander.expand(&json!({"a": 1, "b": "x"})).unwrap(), ";a=1;b=x");
    }
}
