//! Static instance registry.
//!
//! # Responsibilities
//! - Group configured instances by service id
//! - Select an instance per service with round robin

use std::collections::HashMap;
use std::sync::Arc;
use crate::config::schema::InstanceConfig;
use crate::load_balancer::{instance::ServiceInstance, round_robin::RoundRobin, InstanceChooser};

/// Instances by service id, each group with its own rotation.
#[derive(Debug, Default)]
pub struct StaticInstanceRegistry {
    groups: HashMap<String, (Vec<Arc<ServiceInstance>>, RoundRobin)>,
}

impl StaticInstanceRegistry {
    pub fn new(configs: &[InstanceConfig]) -> Self {
        let mut groups: HashMap<String, Vec<Arc<ServiceInstance>>> = HashMap::new();

        for config in configs {
            match ServiceInstance::new(&config.service_id, &config.host, config.port, config.secure) {
                Ok(instance) => groups
                    .entry(config.service_id.clone())
                    .or_default()
                    .push(Arc::new(instance)),
                Err(e) => tracing::warn!(
                    service_id = %config.service_id,
                    host = %config.host,
                    error = %e,
                    "Invalid instance address"
                ),
            }
        }

        Self {
            groups: groups
                .into_iter()
                .map(|(id, instances)| (id, (instances, RoundRobin::new())))
                .collect(),
        }
    }

    pub fn all_instances(&self) -> Vec<Arc<ServiceInstance>> {
        self.groups
            .values()
            .flat_map(|(instances, _)| instances.iter())
            .cloned()
            .collect()
    }

    pub fn service_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }
}

impl InstanceChooser for StaticInstanceRegistry {
    fn choose(&self, service_id: &str) -> Option<Arc<ServiceInstance>> {
        let Some((instances, rr)) = self.groups.get(service_id) else {
            tracing::debug!(service_id = %service_id, "Service not found in instance registry");
            return None;
        };
        rr.next(instances)
    }
}
