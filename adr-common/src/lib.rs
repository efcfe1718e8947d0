//! Core library for the authentication-data replicator: the changelog-to-KV
//! transform pipeline, its batched write buffer, and the STS session token
//! verifier.

pub mod batch;
pub mod changelog;
pub mod config;
pub mod dn;
pub mod errors;
pub mod kv;
pub mod parser;
pub mod primitives;
pub mod token;
pub mod transforms;
pub mod types;

pub use batch::Batch;
pub use changelog::{ChangeType, ChangelogEntry, ChangelogSource};
pub use errors::{Error, Result};
pub use kv::KvClient;
pub use token::{IssueRequest, SessionClaims, SigningKey, TokenStore, VerifyOptions};
pub use transforms::dispatch::dispatch;
