//! Tracks where a configuration value ultimately came from.

use std::path::PathBuf;

/// Where an effective configuration value was sourced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// The compiled-in default was used.
    Default,
    /// Loaded from a TOML file at this path.
    File(PathBuf),
    /// Overridden by an `ADR_*` environment variable.
    Env,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Env => write!(f, "env"),
        }
    }
}

/// A configuration field name paired with the source it was resolved from,
/// for startup diagnostics (`tracing::info!` one line per field).
#[derive(Debug, Clone)]
pub struct Sourced<T> {
    pub field: T,
    pub source: ConfigSource,
}

impl<T> Sourced<T> {
    pub fn new(field: T, source: ConfigSource) -> Self {
        Self { field, source }
    }
}
