//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the routing file: `default` present, hostnames bare, country codes two letters
//! - Check control keys and path lists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed file
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{GeoRedirectConfig, RoutingFile};
use crate::routing::{CountryCode, HostKey};

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("routing file has no `{}` entry", HostKey::DEFAULT)]
    MissingDefault,

    #[error("routing entry has an empty key")]
    EmptyKey,

    #[error("host key `{0}` is defined more than once")]
    DuplicateKey(String),

    #[error("host for `{key}` is invalid: {reason}")]
    InvalidHost { key: String, reason: &'static str },

    #[error("country code `{code}` for `{key}` is not two letters")]
    InvalidCountry { key: String, code: String },

    #[error("`{field}` must not be empty")]
    EmptyControlKey { field: &'static str },

    #[error("force and skip keys must differ (both `{0}`)")]
    ConflictingControlKeys(String),

    #[error("`{field}` path `{path}` must start with `/`")]
    InvalidPath { field: &'static str, path: String },

    #[error("default scheme `{0}` is neither http nor https")]
    InvalidScheme(String),
}

/// Canonical form of a routing-file key.
///
/// Keys written as symbols (`:us`) and plain keys (`us`) are the same key.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().trim_start_matches(':').to_string()
}

/// Validate a parsed routing file.
pub fn validate_routing(file: &RoutingFile) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for (raw_key, entry) in &file.entries {
        let key = normalize_key(raw_key);
        if key.is_empty() {
            errors.push(ValidationError::EmptyKey);
            continue;
        }
        if seen.contains(&key) {
            errors.push(ValidationError::DuplicateKey(key.clone()));
        }

        if let Err(reason) = check_hostname(&entry.host) {
            errors.push(ValidationError::InvalidHost {
                key: key.clone(),
                reason,
            });
        }

        for code in &entry.countries {
            if !CountryCode::new(code).is_iso_alpha2() {
                errors.push(ValidationError::InvalidCountry {
                    key: key.clone(),
                    code: code.clone(),
                });
            }
        }

        seen.push(key);
    }

    if !seen.iter().any(|k| k == HostKey::DEFAULT) {
        errors.push(ValidationError::MissingDefault);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the server configuration.
pub fn validate_config(config: &GeoRedirectConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let redirect = &config.redirect;

    if redirect.force_key.trim().is_empty() {
        errors.push(ValidationError::EmptyControlKey { field: "redirect.force_key" });
    }
    if redirect.skip_key.trim().is_empty() {
        errors.push(ValidationError::EmptyControlKey { field: "redirect.skip_key" });
    }
    if !redirect.force_key.is_empty() && redirect.force_key == redirect.skip_key {
        errors.push(ValidationError::ConflictingControlKeys(redirect.force_key.clone()));
    }

    for (field, paths) in [("redirect.include", &redirect.include), ("redirect.exclude", &redirect.exclude)] {
        for path in paths {
            if !path.starts_with('/') {
                errors.push(ValidationError::InvalidPath {
                    field,
                    path: path.clone(),
                });
            }
        }
    }

    if !matches!(redirect.default_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::InvalidScheme(redirect.default_scheme.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_hostname(host: &str) -> Result<(), &'static str> {
    let host = host.trim();
    if host.is_empty() {
        return Err("empty");
    }
    if host.contains("://") {
        return Err("must not include a scheme");
    }
    if host.contains('/') {
        return Err("must not include a path");
    }
    if host.contains(':') {
        return Err("must not include a port");
    }
    if host.chars().any(char::is_whitespace) {
        return Err("must not contain whitespace");
    }
    Ok(())
}
