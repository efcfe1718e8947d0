//! Error catalog and top-level error type for the authentication-data replicator.
//!
//! This module provides a coded error catalog, categorized by subsystem, in
//! the same shape the rest of this toolchain uses: each error has a unique
//! code and a human-readable message template.
//!
//! # Error Code Ranges
//!
//! | Range      | Category       | Description                             |
//! |------------|----------------|------------------------------------------|
//! | E001-E099  | Config         | Configuration and setup errors          |
//! | E100-E199  | KvTransport    | KV store connection/command failures    |
//! | E200-E299  | ChangelogShape | Malformed changelog entries             |
//! | E300-E399  | Transform      | Object-class transform failures         |
//! | E400-E499  | Token          | STS session token issuance/verification |
//! | E500-E599  | Internal       | Internal/unexpected errors              |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use thiserror::Error;

/// Top-level error type returned by `adr-common` operations.
///
/// Each variant corresponds to one of the error kinds in §7 of the design:
/// KV-transport errors are retryable by the outer driver, changelog-shape
/// errors halt the driver, and token-verification errors are terminal and
/// must not be retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection or command failure against the KV store. The batch was not
    /// committed; the caller may retry the entry.
    #[error("{code}: {message}", code = .0.code_string(), message = .0.message())]
    KvTransport(ErrorCode, #[source] Option<Box<dyn std::error::Error + Send + Sync>>),

    /// The changelog entry was missing a required attribute for its object
    /// class and change type, or carried a value this replicator cannot
    /// parse.
    #[error("{code}: {message} ({detail})", code = .0.code_string(), message = .0.message())]
    ChangelogShape(ErrorCode, String),

    /// Token issuance/verification failure. Matches the exact message
    /// strings required by the spec; callers must not retry.
    #[error("{0}")]
    Token(String),

    /// Configuration failed to load or validate.
    #[error("{code}: {message} ({detail})", code = .0.code_string(), message = .0.message())]
    Config(ErrorCode, String),

    /// An unexpected internal error (bug, poisoned lock, impossible state).
    #[error("{code}: {message} ({detail})", code = .0.code_string(), message = .0.message())]
    Internal(ErrorCode, String),
}

impl Error {
    /// The cataloged [`ErrorCode`] for this error, where applicable.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::KvTransport(c, _) | Self::ChangelogShape(c, _) | Self::Config(c, _) | Self::Internal(c, _) => {
                Some(*c)
            }
            Self::Token(_) => None,
        }
    }

    /// True if the outer driver may safely retry the operation that produced
    /// this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KvTransport(_, _))
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::KvTransport(ErrorCode::KvConnectionFailed, Some(Box::new(err)))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(ErrorCode::InternalSerdeError, err.to_string())
    }
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
