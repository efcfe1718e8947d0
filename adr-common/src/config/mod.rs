//! Configuration for the authentication-data replicator.
//!
//! Values load from a TOML file and are overridden by `ADR_*` environment
//! variables; each effective value is tagged with the [`ConfigSource`] it
//! came from so the daemon can log a startup diagnostic showing exactly
//! where every setting was sourced from.

mod env;
mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::errors::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level replicator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection URL for the KV store, e.g. `redis://127.0.0.1:6379/0`.
    pub kv_url: String,
    /// Path to the JSON file tracking the last-applied changenumber.
    pub cursor_path: std::path::PathBuf,
    /// Bind address for the `/healthz` and `/metrics` HTTP endpoints.
    pub metrics_bind: String,
    /// STS session token settings.
    pub token: TokenConfig,
    /// Log level passed to `tracing_subscriber::EnvFilter`.
    pub log_level: String,
}

/// STS session token configuration (§4.5 / §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// `iss` claim required/embedded on generated and verified tokens.
    pub issuer: String,
    /// `aud` claim required/embedded on generated and verified tokens.
    pub audience: String,
    /// Seconds a superseded signing key remains valid after rotation.
    pub grace_period_secs: u64,
    /// Maximum accepted compact-token byte length before rejection.
    pub max_token_bytes: usize,
    /// The signing-key rotation set. Exactly one entry must have
    /// `is_primary = true`.
    #[serde(default)]
    pub keys: Vec<SigningKeyConfig>,
}

impl TokenConfig {
    /// The grace period as a [`Duration`].
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Builds a [`crate::token::TokenStore`] from this configuration's
    /// issuer/audience/byte-limit and signing keys.
    pub fn build_token_store(&self) -> Result<crate::token::TokenStore, Error> {
        if !self.keys.iter().any(|k| k.is_primary) {
            return Err(Error::Config(
                ErrorCode::ConfigMissingPrimaryKey,
                "token.keys has no entry with is_primary = true".to_string(),
            ));
        }
        let mut store = crate::token::TokenStore::new(self.issuer.clone(), self.audience.clone(), self.max_token_bytes);
        for key in &self.keys {
            store.add_key(crate::token::SigningKey {
                key: key.secret.as_bytes().to_vec(),
                key_id: key.key_id.clone(),
                is_primary: key.is_primary,
                added_at: key.added_at,
            });
        }
        Ok(store)
    }
}

/// One signing key as loaded from configuration (TOML or `ADR_*` env).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKeyConfig {
    pub key_id: String,
    /// Key material, taken verbatim as UTF-8 bytes (a raw shared secret, not
    /// base64 or hex encoded).
    pub secret: String,
    pub is_primary: bool,
    #[serde(default)]
    pub added_at: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "adr".to_string(),
            audience: "sts".to_string(),
            grace_period_secs: 86_400,
            max_token_bytes: 8 * 1024,
            keys: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kv_url: "redis://127.0.0.1:6379/0".to_string(),
            cursor_path: std::path::PathBuf::from("adr-cursor.json"),
            metrics_bind: "127.0.0.1:9897".to_string(),
            token: TokenConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file (if present) and then applies
    /// `ADR_*` environment variable overrides, recording the [`ConfigSource`]
    /// of every field that ends up non-default.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<Sourced<String>>), Error> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config(
                    ErrorCode::ConfigNotFound,
                    path.display().to_string(),
                ));
            }
            let text = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(ErrorCode::ConfigReadError, e.to_string()))?;
            let from_file: Config =
                toml::from_str(&text).map_err(|e| Error::Config(ErrorCode::ConfigParseError, e.to_string()))?;
            sources.push(Sourced::new(
                "config_file".to_string(),
                ConfigSource::File(path.to_path_buf()),
            ));
            config = from_file;
        }

        let mut parser = EnvParser::new("ADR");
        if let Some(url) = parser.string("KV_URL") {
            config.kv_url = url;
            sources.push(Sourced::new("kv_url".to_string(), ConfigSource::Env));
        }
        if let Some(path) = parser.string("CURSOR_PATH") {
            config.cursor_path = std::path::PathBuf::from(path);
            sources.push(Sourced::new("cursor_path".to_string(), ConfigSource::Env));
        }
        if let Some(bind) = parser.string("METRICS_BIND") {
            config.metrics_bind = bind;
            sources.push(Sourced::new("metrics_bind".to_string(), ConfigSource::Env));
        }
        if let Some(issuer) = parser.string("TOKEN_ISSUER") {
            config.token.issuer = issuer;
            sources.push(Sourced::new("token.issuer".to_string(), ConfigSource::Env));
        }
        if let Some(audience) = parser.string("TOKEN_AUDIENCE") {
            config.token.audience = audience;
            sources.push(Sourced::new("token.audience".to_string(), ConfigSource::Env));
        }
        if let Some(secs) = parser.u64("TOKEN_GRACE_PERIOD_SECS")? {
            config.token.grace_period_secs = secs;
            sources.push(Sourced::new(
                "token.grace_period_secs".to_string(),
                ConfigSource::Env,
            ));
        }
        if let Some(level) = parser.string("LOG_LEVEL") {
            config.log_level = level;
            sources.push(Sourced::new("log_level".to_string(), ConfigSource::Env));
        }
        if let Some(secret) = parser.string("TOKEN_PRIMARY_KEY") {
            let key_id = parser.string("TOKEN_PRIMARY_KEY_ID").unwrap_or_else(|| "env-primary".to_string());
            for key in &mut config.token.keys {
                key.is_primary = false;
            }
            config.token.keys.push(SigningKeyConfig {
                key_id,
                secret,
                is_primary: true,
                added_at: 0,
            });
            sources.push(Sourced::new("token.keys".to_string(), ConfigSource::Env));
        }
        parser.into_result().map_err(|e| Error::Config(ErrorCode::ConfigEnvError, e.to_string()))?;

        config.validate()?;
        Ok((config, sources))
    }

    /// Validates required fields. Called automatically by [`Config::load`].
    pub fn validate(&self) -> Result<(), Error> {
        if self.kv_url.trim().is_empty() {
            return Err(Error::Config(ErrorCode::ConfigMissingKvUrl, "kv_url is empty".to_string()));
        }
        if self.token.issuer.trim().is_empty() || self.token.audience.trim().is_empty() {
            return Err(Error::Config(
                ErrorCode::ConfigValidationError,
                "token.issuer and token.audience must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}
