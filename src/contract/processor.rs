//! Parameter processors.
//!
//! # Responsibilities
//! - Bind an annotated parameter to a path, query, header, form or map slot
//! - Report whether the parameter is HTTP-bound
//!
//! # Design Decisions
//! - Processors are keyed by annotation kind; registering a processor for an
//!   existing kind replaces the built-in one
//! - A nameless path variable binds to the next unclaimed `{...}` in the path

use std::collections::HashMap;
use std::sync::Arc;
use crate::contract::annotation::{AnnotationKind, MethodMeta, ParamAnnotation, ParamMeta};
use crate::contract::expander::MatrixExpander;
use crate::contract::template::RequestTemplate;
use crate::error::ContractError;

/// State handed to a processor for one parameter annotation.
pub struct ParameterContext<'a> {
    pub template: &'a mut RequestTemplate,
    pub method: &'a MethodMeta,
    pub index: usize,
    pub param: &'a ParamMeta,
}

impl ParameterContext<'_> {
    /// Record the template name this parameter is bound to.
    pub fn set_parameter_name(&mut self, name: &str) {
        self.template.bind_name(self.index, name);
    }

    /// Require a binding name.
    pub fn require_name(&self, annotation: &ParamAnnotation) -> Result<String, ContractError> {
        if annotation.value.trim().is_empty() {
            return Err(ContractError::MissingParameterName {
                method: self.method.name.clone(),
                index: self.index,
                kind: annotation.kind.to_string(),
            });
        }
        Ok(annotation.value.clone())
    }
}

/// Handles one parameter annotation kind.
pub trait ParameterProcessor: Send + Sync {
    fn kind(&self) -> AnnotationKind;

    /// Returns whether the parameter is bound into the HTTP request.
    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError>;
}

pub struct PathVariableProcessor;

impl ParameterProcessor for PathVariableProcessor {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::PATH_VARIABLE
    }

    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError> {
        let name = if annotation.value.is_empty() {
            match next_unclaimed_placeholder(ctx.template) {
                Some(name) => name,
                None => return ctx.require_name(annotation).map(|_| true),
            }
        } else {
            annotation.value.clone()
        };
        ctx.set_parameter_name(&name);
        if !ctx.template.references(&name) {
            ctx.template.form_params.push(name);
        }
        Ok(true)
    }
}

fn next_unclaimed_placeholder(template: &RequestTemplate) -> Option<String> {
    let claimed: Vec<&String> = template.index_to_name.values().flatten().collect();
    let mut rest = template.uri.as_str();
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let name = &after[..end];
        if !claimed.iter().any(|c| c.as_str() == name) {
            return Some(name.to_string());
        }
        rest = &after[end + 1..];
    }
    None
}

pub struct RequestParamProcessor;

impl ParameterProcessor for RequestParamProcessor {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::REQUEST_PARAM
    }

    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError> {
        if ctx.param.ty.is_map() {
            set_query_map(ctx)?;
            return Ok(true);
        }
        let name = ctx.require_name(annotation)?;
        ctx.set_parameter_name(&name);
        ctx.template.queries.append(&name, format!("{{{}}}", name));
        Ok(true)
    }
}

pub struct RequestHeaderProcessor;

impl ParameterProcessor for RequestHeaderProcessor {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::REQUEST_HEADER
    }

    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError> {
        if ctx.param.ty.is_map() {
            if ctx.template.header_map_index.is_some() {
                return Err(ContractError::DuplicateMapParameter {
                    method: ctx.method.name.clone(),
                    kind: "header map".into(),
                });
            }
            ctx.template.header_map_index = Some(ctx.index);
            return Ok(true);
        }
        let name = ctx.require_name(annotation)?;
        ctx.set_parameter_name(&name);
        ctx.template.headers.append(&name, format!("{{{}}}", name));
        Ok(true)
    }
}

pub struct QueryMapProcessor;

impl ParameterProcessor for QueryMapProcessor {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::QUERY_MAP
    }

    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        _annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError> {
        set_query_map(ctx)?;
        Ok(true)
    }
}

fn set_query_map(ctx: &mut ParameterContext<'_>) -> Result<(), ContractError> {
    if ctx.template.query_map_index.is_some() {
        return Err(ContractError::DuplicateMapParameter {
            method: ctx.method.name.clone(),
            kind: "query map".into(),
        });
    }
    ctx.template.query_map_index = Some(ctx.index);
    Ok(())
}

pub struct RequestPartProcessor;

impl ParameterProcessor for RequestPartProcessor {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::REQUEST_PART
    }

    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError> {
        let name = ctx.require_name(annotation)?;
        ctx.set_parameter_name(&name);
        ctx.template.form_params.push(name);
        Ok(true)
    }
}

pub struct MatrixVariableProcessor;

impl ParameterProcessor for MatrixVariableProcessor {
    fn kind(&self) -> AnnotationKind {
        AnnotationKind::MATRIX_VARIABLE
    }

    fn process(
        &self,
        ctx: &mut ParameterContext<'_>,
        annotation: &ParamAnnotation,
    ) -> Result<bool, ContractError> {
        let name = ctx.require_name(annotation)?;
        ctx.set_parameter_name(&name);
        ctx.template
            .index_to_expander
            .insert(ctx.index, Arc::new(MatrixExpander::new(&name)));
        Ok(true)
    }
}

/// Processors by annotation kind.
#[derive(Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<AnnotationKind, Arc<dyn ParameterProcessor>>,
}

impl ProcessorRegistry {
    pub fn empty() -> Self {
        Self { processors: HashMap::new() }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PathVariableProcessor));
        registry.register(Arc::new(RequestParamProcessor));
        registry.register(Arc::new(RequestHeaderProcessor));
        registry.register(Arc::new(QueryMapProcessor));
        registry.register(Arc::new(RequestPartProcessor));
        registry.register(Arc::new(MatrixVariableProcessor));
        registry
    }

    /// Add a processor, replacing any existing one for the same kind.
    pub fn register(&mut self, processor: Arc<dyn ParameterProcessor>) {
        self.processors.insert(processor.kind(), processor);
    }

    pub fn get(&self, kind: &AnnotationKind) -> Option<&Arc<dyn ParameterProcessor>> {
        self.processors.get(kind)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&AnnotationKind> = self.processors.keys().collect();
        kinds.sort();
        f.debug_struct("ProcessorRegistry").field("kinds", &kinds).finish()
    }
}
