//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request to http://{service-id}/...
//!     → pool.rs (instances registered for the service id)
//!     → round_robin.rs (rotate through instances)
//!     → instance.rs (rewrite the URL onto the chosen instance)
//!     → transport::lifecycle (observers notified around execution)
//! ```
//!
//! # Design Decisions
//! - Instance selection sits behind `InstanceChooser` so discovery can be swapped
//! - The static registry is built once from configuration and never mutated
//! - An empty service yields no instance rather than an error; the caller decides

pub mod instance;
pub mod pool;
pub mod round_robin;

use std::sync::Arc;
pub use instance::ServiceInstance;
pub use pool::StaticInstanceRegistry;
pub use round_robin::RoundRobin;

/// Picks an instance for a service id.
pub trait InstanceChooser: Send + Sync + std::fmt::Debug {
    fn choose(&self, service_id: &str) -> Option<Arc<ServiceInstance>>;
}
