//! Refreshable request options.
//!
//! # Responsibilities
//! - Hold one swappable options cell per client, named `request-options-{context_id}`
//! - Install new versions without readers seeing a partial update
//!
//! # Design Decisions
//! - Cells are `ArcSwap` values; a refresh replaces the whole `VersionedOptions`
//! - Handles look the cell up by name on every read, so a re-registered cell is picked up

use std::sync::Arc;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use crate::resilience::Options;

/// Prefix of every options cell name.
pub const OPTIONS_PREFIX: &str = "request-options-";

/// Name of the refreshable options cell for a client.
pub fn options_name(context_id: &str) -> String {
    format!("{}{}", OPTIONS_PREFIX, context_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedOptions {
    pub version: u64,
    pub options: Options,
}

/// Named refreshable options cells.
#[derive(Debug, Default)]
pub struct RefreshScope {
    cells: DashMap<String, Arc<ArcSwap<VersionedOptions>>>,
}

impl RefreshScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell. An existing cell keeps its identity and gets the new options.
    pub fn register(&self, name: &str, options: Options) {
        if let Some(cell) = self.cells.get(name) {
            cell.rcu(|current| VersionedOptions {
                version: current.version + 1,
                options,
            });
            return;
        }
        self.cells
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(VersionedOptions { version: 0, options })));
    }

    pub fn current(&self, name: &str) -> Option<VersionedOptions> {
        self.cells.get(name).map(|cell| **cell.load())
    }

    /// Install new options. Returns the new version, or `None` if no cell exists.
    pub fn refresh(&self, name: &str, options: Options) -> Option<u64> {
        let cell = self.cells.get(name)?;
        let previous = cell.rcu(|current| VersionedOptions {
            version: current.version + 1,
            options,
        });
        let version = previous.version + 1;
        tracing::info!(
            name = %name,
            version,
            connect_timeout_ms = options.connect_timeout.as_millis() as u64,
            read_timeout_ms = options.read_timeout.as_millis() as u64,
            follow_redirects = options.follow_redirects,
            "Refreshed request options"
        );
        Some(version)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cells.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn handle(self: &Arc<Self>, name: &str, fallback: Options) -> OptionsHandle {
        OptionsHandle {
            scope: self.clone(),
            name: name.to_string(),
            fallback,
        }
    }
}

/// Reads the current options of one cell.
#[derive(Debug, Clone)]
pub struct OptionsHandle {
    scope: Arc<RefreshScope>,
    name: String,
    fallback: Options,
}

impl OptionsHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> Options {
        self.scope
            .current(&self.name)
            .map(|v| v.options)
            .unwrap_or(self.fallback)
    }
}
