//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use crate::config::schema::{ClientProperties, Manifest};
use crate::config::validation::validate_properties;
use crate::error::PropertiesError;

/// Load and validate client properties from a TOML file.
pub fn load_properties(path: &Path) -> Result<ClientProperties, PropertiesError> {
    let content = fs::read_to_string(path)?;
    let props: ClientProperties = toml::from_str(&content)?;

    validate_properties(&props).map_err(PropertiesError::Validation)?;

    Ok(props)
}

/// Load a manifest and validate its `[client]` table.
pub fn load_manifest(path: &Path) -> Result<Manifest, PropertiesError> {
    let content = fs::read_to_string(path)?;
    parse_manifest(&content)
}

pub fn parse_manifest(content: &str) -> Result<Manifest, PropertiesError> {
    let manifest: Manifest = toml::from_str(content)?;

    validate_properties(&manifest.client).map_err(PropertiesError::Validation)?;

    Ok(manifest)
}
