//! The KV store collaborator (§6): `get`, `set`, `del`, `sadd`, `srem`,
//! `smembers`, plus an atomic pipeline. The real implementation is a thin
//! wrapper over the `redis` crate; an in-memory fake backs the test suite.

use crate::errors::Error;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// A single queued write, as flushed by [`crate::batch::Batch::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(String, String),
    Del(String),
    Sadd(String, String),
    Srem(String, String),
}

/// The external KV store collaborator. Implemented against `redis` in
/// production; faked in-memory for tests.
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, Error>;
    /// Applies every command as one atomic pipeline/transaction.
    async fn commit(&self, commands: &[Command]) -> Result<(), Error>;
}

/// `redis`-backed [`KvClient`], using a pooled connection manager and
/// `MULTI`/`EXEC` for atomic commits.
pub struct RedisKvClient {
    pool: deadpool_redis::Pool,
}

impl RedisKvClient {
    /// Builds a connection pool against `url` (e.g.
    /// `redis://127.0.0.1:6379/0`).
    pub fn connect(url: &str) -> Result<Self, Error> {
        let cfg = deadpool_redis::Config::from_url(url);
        let pool = cfg
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Error::KvTransport(crate::errors::ErrorCode::KvConnectionFailed, Some(Box::new(e))))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl KvClient for RedisKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::KvTransport(crate::errors::ErrorCode::KvConnectionFailed, Some(Box::new(e)))
        })?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, Error> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::KvTransport(crate::errors::ErrorCode::KvConnectionFailed, Some(Box::new(e)))
        })?;
        let members: BTreeSet<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?;
        Ok(members)
    }

    async fn commit(&self, commands: &[Command]) -> Result<(), Error> {
        if commands.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::KvTransport(crate::errors::ErrorCode::KvConnectionFailed, Some(Box::new(e)))
        })?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in commands {
            match command {
                Command::Set(key, value) => {
                    pipe.cmd("SET").arg(key).arg(value).ignore();
                }
                Command::Del(key) => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                Command::Sadd(key, member) => {
                    pipe.cmd("SADD").arg(key).arg(member).ignore();
                }
                Command::Srem(key, member) => {
                    pipe.cmd("SREM").arg(key).arg(member).ignore();
                }
            }
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::KvTransport(crate::errors::ErrorCode::KvPipelineFailed, Some(Box::new(e))))?;
        Ok(())
    }
}

/// An in-memory [`KvClient`] used by unit and integration tests. Commits are
/// applied in order and are atomic only in the sense that no partial state
/// is observable by other `get`/`smembers` calls mid-pipeline (the lock is
/// held for the whole commit).
#[derive(Default)]
pub struct InMemoryKvClient {
    strings: Mutex<HashMap<String, String>>,
    sets: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryKvClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: direct snapshot of a string key without going through a
    /// batch.
    #[must_use]
    pub fn peek_string(&self, key: &str) -> Option<String> {
        self.strings.lock().unwrap().get(key).cloned()
    }

    /// Test helper: direct snapshot of a set key without going through a
    /// batch.
    #[must_use]
    pub fn peek_set(&self, key: &str) -> BTreeSet<String> {
        self.sets.lock().unwrap().get(key).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl KvClient for InMemoryKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.strings.lock().unwrap().get(key).cloned())
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, Error> {
        Ok(self.sets.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    async fn commit(&self, commands: &[Command]) -> Result<(), Error> {
        let mut strings = self.strings.lock().unwrap();
        let mut sets = self.sets.lock().unwrap();
        for command in commands {
            match command {
                Command::Set(key, value) => {
                    strings.insert(key.clone(), value.clone());
                }
                Command::Del(key) => {
                    strings.remove(key);
                }
                Command::Sadd(key, member) => {
                    sets.entry(key.clone()).or_default().insert(member.clone());
                }
                Command::Srem(key, member) => {
                    if let Some(set) = sets.get_mut(key) {
                        set.remove(member);
                    }
                }
            }
        }
        Ok(())
    }
}
