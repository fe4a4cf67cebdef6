//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{GeoRedirectConfig, RoutingFile};
use crate::config::validation::{normalize_key, validate_config, validate_routing, ValidationError};
use crate::routing::{HostKey, RouteEntry, RoutingError, RoutingTable};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Routing file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingFormat {
    Toml,
    Yaml,
}

impl RoutingFormat {
    /// `.yml`/`.yaml` is YAML, anything else TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                RoutingFormat::Yaml
            }
            _ => RoutingFormat::Toml,
        }
    }
}

/// Load and validate the server configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GeoRedirectConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GeoRedirectConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load, validate and build the routing table.
pub fn load_routing(path: &Path) -> Result<RoutingTable, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_routing(&content, RoutingFormat::from_path(path))
}

/// Parse routing file content.
pub fn parse_routing(content: &str, format: RoutingFormat) -> Result<RoutingTable, ConfigError> {
    let file: RoutingFile = match format {
        RoutingFormat::Toml => toml::from_str(content)?,
        RoutingFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_routing(&file).map_err(ConfigError::Validation)?;

    let table = RoutingTable::new(file.entries.into_iter().map(|(key, entry)| {
        (
            HostKey::new(normalize_key(&key)),
            RouteEntry::new(entry.host, entry.countries),
        )
    }))?;

    Ok(table)
}
