//! Error catalog for the authentication-data replicator.
//!
//! Defines a coded error catalog with a unique code per error, a
//! human-readable message template, and remediation steps. Mirrors the
//! `ADR-Exxx` convention used across this toolchain's other daemons.
//!
//! # Example
//!
//! ```rust
//! use adr_common::errors::catalog::ErrorCode;
//!
//! let entry = ErrorCode::KvConnectionFailed.entry();
//! println!("{}: {}", entry.code, entry.message);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all replicator error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Config (001-099)
    /// Configuration file not found
    ConfigNotFound,
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file failed to parse as TOML
    ConfigParseError,
    /// Configuration failed validation
    ConfigValidationError,
    /// Environment variable override had an invalid value
    ConfigEnvError,
    /// No KV store URL configured
    ConfigMissingKvUrl,
    /// No primary signing key configured for the token verifier
    ConfigMissingPrimaryKey,

    // KvTransport (100-199)
    /// Failed to establish a connection to the KV store
    KvConnectionFailed,
    /// A KV command failed against an established connection
    KvCommandFailed,
    /// The batch pipeline could not be committed atomically
    KvPipelineFailed,
    /// A value read from the KV store was not valid JSON
    KvMalformedBlob,

    // ChangelogShape (200-299)
    /// Changelog entry was missing a required attribute
    ChangelogMissingAttribute,
    /// Changelog entry carried a value that could not be parsed
    ChangelogInvalidValue,
    /// `changetype` was not one of add/modify/delete
    ChangelogUnknownChangeType,
    /// `targetdn` could not be parsed into components
    ChangelogMalformedDn,

    // Transform (300-399)
    /// `objectclass` did not match any known transform
    TransformUnknownObjectClass,
    /// An unknown modification attribute was skipped
    TransformUnknownModification,
    /// A referenced entity was missing during a rename
    TransformRenameMissingEntity,
    /// The policy-rule parser rejected a rule
    TransformRuleParseFailed,

    // Token (400-499)
    /// Compact token did not have three dot-separated segments, or exceeded
    /// the maximum accepted size
    TokenMalformed,
    /// Base64url decoding of a token segment failed
    TokenInvalidEncoding,
    /// `tokenVersion` did not match the supported version
    TokenUnsupportedVersion,
    /// `tokenType` did not match `"sts-session"`
    TokenInvalidType,
    /// `iss` did not match the expected issuer
    TokenInvalidIssuer,
    /// `aud` did not match the expected audience
    TokenInvalidAudience,
    /// `keyId` was not present in the key store (evicted or unknown key)
    TokenUnknownKey,
    /// HMAC signature verification failed
    TokenBadSignature,
    /// `now > exp`
    TokenExpired,
    /// `now < nbf`
    TokenNotYetValid,
    /// No primary key was available to sign a new token
    TokenNoPrimaryKey,
    /// Requested expiry was not in the future
    TokenExpiryNotInFuture,

    // Internal (500-599)
    /// Serialization/deserialization error
    InternalSerdeError,
    /// Unexpected internal state (should be unreachable)
    InternalStateError,
    /// Cursor file could not be read or written
    InternalCursorIoError,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigNotFound => 1,
            Self::ConfigReadError => 2,
            Self::ConfigParseError => 3,
            Self::ConfigValidationError => 4,
            Self::ConfigEnvError => 5,
            Self::ConfigMissingKvUrl => 6,
            Self::ConfigMissingPrimaryKey => 7,

            Self::KvConnectionFailed => 100,
            Self::KvCommandFailed => 101,
            Self::KvPipelineFailed => 102,
            Self::KvMalformedBlob => 103,

            Self::ChangelogMissingAttribute => 200,
            Self::ChangelogInvalidValue => 201,
            Self::ChangelogUnknownChangeType => 202,
            Self::ChangelogMalformedDn => 203,

            Self::TransformUnknownObjectClass => 300,
            Self::TransformUnknownModification => 301,
            Self::TransformRenameMissingEntity => 302,
            Self::TransformRuleParseFailed => 303,

            Self::TokenMalformed => 400,
            Self::TokenInvalidEncoding => 401,
            Self::TokenUnsupportedVersion => 402,
            Self::TokenInvalidType => 403,
            Self::TokenInvalidIssuer => 404,
            Self::TokenInvalidAudience => 405,
            Self::TokenUnknownKey => 406,
            Self::TokenBadSignature => 407,
            Self::TokenExpired => 408,
            Self::TokenNotYetValid => 409,
            Self::TokenNoPrimaryKey => 410,
            Self::TokenExpiryNotInFuture => 411,

            Self::InternalSerdeError => 500,
            Self::InternalStateError => 501,
            Self::InternalCursorIoError => 502,
        }
    }

    /// Returns the formatted error code string (e.g., "ADR-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("ADR-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::KvTransport,
            200..=299 => ErrorCategory::ChangelogShape,
            300..=399 => ErrorCategory::Transform,
            400..=499 => ErrorCategory::Token,
            _ => ErrorCategory::Internal,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self.remediation().iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "configuration file not found",
            Self::ConfigReadError => "configuration file could not be read",
            Self::ConfigParseError => "configuration file is not valid TOML",
            Self::ConfigValidationError => "configuration failed validation",
            Self::ConfigEnvError => "environment variable override is invalid",
            Self::ConfigMissingKvUrl => "no KV store URL configured",
            Self::ConfigMissingPrimaryKey => "no primary signing key configured",

            Self::KvConnectionFailed => "failed to connect to the KV store",
            Self::KvCommandFailed => "a KV command failed",
            Self::KvPipelineFailed => "batch pipeline could not be committed",
            Self::KvMalformedBlob => "stored blob was not valid JSON",

            Self::ChangelogMissingAttribute => "changelog entry is missing a required attribute",
            Self::ChangelogInvalidValue => "changelog entry carried an unparseable value",
            Self::ChangelogUnknownChangeType => "changetype is not one of add/modify/delete",
            Self::ChangelogMalformedDn => "targetdn could not be parsed",

            Self::TransformUnknownObjectClass => "objectclass has no matching transform",
            Self::TransformUnknownModification => "modification attribute is not recognized",
            Self::TransformRenameMissingEntity => "rename target entity is missing",
            Self::TransformRuleParseFailed => "policy rule failed to parse",

            Self::TokenMalformed => "Session token too large",
            Self::TokenInvalidEncoding => "Invalid JWT format",
            Self::TokenUnsupportedVersion => "Unsupported token version",
            Self::TokenInvalidType => "Invalid token type",
            Self::TokenInvalidIssuer => "Invalid issuer",
            Self::TokenInvalidAudience => "Invalid audience",
            Self::TokenUnknownKey => "Unknown signing key",
            Self::TokenBadSignature => "Invalid signature",
            Self::TokenExpired => "Token expired",
            Self::TokenNotYetValid => "Token not yet valid",
            Self::TokenNoPrimaryKey => "No primary signing key available",
            Self::TokenExpiryNotInFuture => "Expiry must be in the future",

            Self::InternalSerdeError => "serialization error",
            Self::InternalStateError => "internal state error",
            Self::InternalCursorIoError => "cursor file could not be read or written",
        }
    }

    /// Returns remediation steps for operators.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigNotFound => &["Pass --config or set ADR_CONFIG to an existing file"],
            Self::ConfigMissingKvUrl => &["Set kv_url in the config file or ADR_KV_URL"],
            Self::ConfigMissingPrimaryKey => {
                &["Provision a primary signing key via config or ADR_TOKEN_PRIMARY_KEY"]
            }
            Self::KvConnectionFailed => &[
                "Verify the KV store is reachable at the configured URL",
                "Check network/firewall rules between the replicator and the store",
            ],
            Self::TransformRenameMissingEntity => {
                &["This entry was skipped with a warning; verify upstream directory consistency"]
            }
            Self::TokenUnknownKey => &["The signing key may have been evicted past its grace period"],
            _ => &[],
        }
    }

    /// Every defined error code, for exhaustiveness tests.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigNotFound,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::ConfigMissingKvUrl,
            Self::ConfigMissingPrimaryKey,
            Self::KvConnectionFailed,
            Self::KvCommandFailed,
            Self::KvPipelineFailed,
            Self::KvMalformedBlob,
            Self::ChangelogMissingAttribute,
            Self::ChangelogInvalidValue,
            Self::ChangelogUnknownChangeType,
            Self::ChangelogMalformedDn,
            Self::TransformUnknownObjectClass,
            Self::TransformUnknownModification,
            Self::TransformRenameMissingEntity,
            Self::TransformRuleParseFailed,
            Self::TokenMalformed,
            Self::TokenInvalidEncoding,
            Self::TokenUnsupportedVersion,
            Self::TokenInvalidType,
            Self::TokenInvalidIssuer,
            Self::TokenInvalidAudience,
            Self::TokenUnknownKey,
            Self::TokenBadSignature,
            Self::TokenExpired,
            Self::TokenNotYetValid,
            Self::TokenNoPrimaryKey,
            Self::TokenExpiryNotInFuture,
            Self::InternalSerdeError,
            Self::InternalStateError,
            Self::InternalCursorIoError,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and setup errors (E001-E099)
    Config,
    /// KV store connectivity/command errors (E100-E199)
    KvTransport,
    /// Malformed changelog entries (E200-E299)
    ChangelogShape,
    /// Object-class transform errors (E300-E399)
    Transform,
    /// STS session token issuance/verification errors (E400-E499)
    Token,
    /// Internal/unexpected errors (E500-E599)
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "Configuration",
            Self::KvTransport => "KV Transport",
            Self::ChangelogShape => "Changelog Shape",
            Self::Transform => "Transform",
            Self::Token => "Token",
            Self::Internal => "Internal",
        };
        write!(f, "{name}")
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "ADR-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
