//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! manifest (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks on client properties)
//!     → ClientProperties + client declarations
//!     → resolver.rs (declarative layer + property buckets per client)
//!     → EffectiveClientConfig
//!
//! On change:
//!     watcher.rs detects the edit
//!     → loader.rs reloads the manifest
//!     → refresh.rs installs new options in each registered cell
//!     → clients read the new options on their next request
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal manifests
//! - Validation separates syntactic (serde) from semantic checks
//! - Only request options are refreshable; everything else is fixed when a
//!   client is built

pub mod loader;
pub mod refresh;
pub mod resolver;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use refresh::{options_name, OptionsHandle, RefreshScope};
pub use resolver::{ClientConfigurer, ConfigurationResolver, MergeOrder};
pub use schema::{ClientConfigProperties, ClientDeclaration, ClientProperties, InstanceConfig, Manifest};
