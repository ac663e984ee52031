//! Contract subsystem.
//!
//! # Data Flow
//! ```text
//! InterfaceMeta (code or manifest)
//!     → compiler.rs (routing annotations, placeholders, headers)
//!     → processor.rs (parameter bindings)
//!     → expander.rs (converting expanders)
//!     → template.rs (immutable RequestTemplate per method)
//!     → registry.rs (one Contract per client type)
//!
//! Per call:
//!     prepared.rs expands a template into a PreparedRequest
//! ```
//!
//! # Design Decisions
//! - Templates are immutable once compiled and shared via Arc
//! - Every violation has its own ContractError variant
//! - Compilation does no I/O

pub mod annotation;
pub mod compiler;
pub mod environment;
pub mod expander;
pub mod prepared;
pub mod processor;
pub mod registry;
pub mod template;

pub use annotation::{
    AnnotationKind, CollectionFormat, HttpMethod, InterfaceMeta, MethodMeta, ParamAnnotation,
    ParamMeta, RequestMapping, TypeDescriptor, TypeKind, TypeRef,
};
pub use compiler::{Contract, ContractCompiler, ContractStrategy};
pub use environment::{Environment, MapEnvironment, SystemEnvironment};
pub use prepared::PreparedRequest;
pub use registry::ContractRegistry;
pub use template::{MultiMap, RequestTemplate};
