//! Client construction and invocation.
//!
//! # Data Flow
//! ```text
//! ClientDescriptor
//!     → factory.rs (base config, resolver, customizers, URL and transport)
//!     → builder.rs (capabilities, contract compilation)
//!     → target.rs (Targeter)
//!     → proxy.rs (ContractClient: expand, encode, intercept, execute, decode)
//! ```
//!
//! # Design Decisions
//! - Components are trait objects shared via Arc; property buckets name them
//!   and catalog.rs maps names to instances
//! - A built client is immutable; only refreshable options change under it

pub mod builder;
pub mod capability;
pub mod catalog;
pub mod codec;
pub mod customizer;
pub mod factory;
pub mod interceptor;
pub mod proxy;
pub mod target;

pub use builder::{ClientBuilder, EffectiveClientConfig, ExceptionPropagation, OptionsSource};
pub use capability::Capability;
pub use catalog::ComponentCatalog;
pub use codec::{Decoder, Encoder, ErrorDecoder, ErrorDecoderFactory, QueryMapEncoder};
pub use customizer::BuilderCustomizer;
pub use factory::{ClientFactory, CompiledClient};
pub use interceptor::RequestInterceptor;
pub use proxy::ContractClient;
pub use target::{DefaultTargeter, Target, Targeter};
