//! Declarative HTTP clients.
//!
//! Interfaces are described as metadata (methods, routing and parameter
//! annotations), compiled once into request templates and turned into live
//! clients whose configuration merges scoped components with property files.

pub mod client;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod load_balancer;
pub mod observability;
pub mod registrar;
pub mod resilience;
pub mod transport;

pub use client::{ClientFactory, ContractClient};
pub use config::schema::{ClientProperties, Manifest};
pub use error::{ConfigError, ContractError, InvocationFault};
pub use registrar::{bootstrap, Bootstrap};
