//! Batched write buffer with a read-through cache (§4.1).
//!
//! Transforms never touch the KV store directly. They read and stage writes
//! against a [`Batch`], which serves reads from its own pending writes first
//! (read-your-writes within the batch) and falls through to the store only
//! on a cache miss. Nothing reaches the store until [`Batch::commit`].

use crate::errors::Error;
use crate::kv::{Command, KvClient};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone)]
enum Cached {
    Value(Option<String>),
    Set(BTreeSet<String>),
}

/// A single transform's pending writes, with read-your-writes semantics
/// against the same transform's earlier reads within the batch.
pub struct Batch<'a> {
    client: &'a dyn KvClient,
    cache: HashMap<String, Cached>,
    commands: Vec<Command>,
}

impl<'a> Batch<'a> {
    #[must_use]
    pub fn new(client: &'a dyn KvClient) -> Self {
        Self {
            client,
            cache: HashMap::new(),
            commands: Vec::new(),
        }
    }

    /// Reads a string value, serving from the in-batch cache if this key was
    /// already read or written this batch.
    pub async fn get(&mut self, key: &str) -> Result<Option<String>, Error> {
        if let Some(Cached::Value(v)) = self.cache.get(key) {
            return Ok(v.clone());
        }
        let value = self.client.get(key).await?;
        self.cache.insert(key.to_string(), Cached::Value(value.clone()));
        Ok(value)
    }

    /// Reads a JSON blob, treating an absent key as an empty object.
    pub async fn get_json(&mut self, key: &str) -> Result<serde_json::Value, Error> {
        match self.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(serde_json::Value::Object(serde_json::Map::new())),
        }
    }

    /// Stages a string write, visible to subsequent `get`s in this batch.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        self.cache.insert(key.to_string(), Cached::Value(Some(value.clone())));
        self.commands.push(Command::Set(key.to_string(), value));
    }

    /// Stages a JSON blob write.
    pub fn set_json(&mut self, key: &str, value: &serde_json::Value) -> Result<(), Error> {
        self.set(key, serde_json::to_string(value)?);
        Ok(())
    }

    /// Stages a key deletion, visible to subsequent `get`s in this batch.
    pub fn del(&mut self, key: &str) {
        self.cache.insert(key.to_string(), Cached::Value(None));
        self.commands.push(Command::Del(key.to_string()));
    }

    /// Reads a Redis-set's members, serving from the in-batch cache.
    pub async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>, Error> {
        if let Some(Cached::Set(s)) = self.cache.get(key) {
            return Ok(s.clone());
        }
        let members = self.client.smembers(key).await?;
        self.cache.insert(key.to_string(), Cached::Set(members.clone()));
        Ok(members)
    }

    /// Stages a member addition to a Redis set.
    pub fn sadd(&mut self, key: &str, member: impl Into<String>) {
        let member = member.into();
        if let Some(Cached::Set(s)) = self.cache.get_mut(key) {
            s.insert(member.clone());
        } else {
            self.cache.insert(key.to_string(), Cached::Set(BTreeSet::from([member.clone()])));
        }
        self.commands.push(Command::Sadd(key.to_string(), member));
    }

    /// Stages a member removal from a Redis set.
    pub fn srem(&mut self, key: &str, member: impl Into<String>) {
        let member = member.into();
        if let Some(Cached::Set(s)) = self.cache.get_mut(key) {
            s.remove(&member);
        } else {
            self.cache.insert(key.to_string(), Cached::Set(BTreeSet::new()));
        }
        self.commands.push(Command::Srem(key.to_string(), member));
    }

    /// Flushes every staged command to the store as one atomic pipeline. On
    /// success the batch is spent and must not be reused.
    pub async fn commit(self) -> Result<(), Error> {
        self.client.commit(&self.commands).await
    }

    /// Number of staged commands, for logging/metrics at the call site.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.commands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvClient;

    #[tokio::test]
    async fn read_your_writes_within_batch() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        assert_eq!(batch.get("/uuid/a").await.unwrap(), None);
        batch.set("/uuid/a", "hello");
        assert_eq!(batch.get("/uuid/a").await.unwrap(), Some("hello".to_string()));
        // not yet visible outside the batch
        assert_eq!(client.peek_string("/uuid/a"), None);
        batch.commit().await.unwrap();
        assert_eq!(client.peek_string("/uuid/a"), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn del_is_visible_within_batch() {
        let client = InMemoryKvClient::new();
        client.commit(&[Command::Set("/uuid/a".into(), "x".into())]).await.unwrap();
        let mut batch = Batch::new(&client);
        assert_eq!(batch.get("/uuid/a").await.unwrap(), Some("x".to_string()));
        batch.del("/uuid/a");
        assert_eq!(batch.get("/uuid/a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sadd_srem_are_visible_within_batch() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        batch.sadd("set:owners", "a");
        batch.sadd("set:owners", "b");
        batch.srem("set:owners", "a");
        let members = batch.smembers("set:owners").await.unwrap();
        assert_eq!(members, BTreeSet::from(["b".to_string()]));
        batch.commit().await.unwrap();
        assert_eq!(client.peek_set("set:owners"), BTreeSet::from(["b".to_string()]));
    }

    #[tokio::test]
    async fn commit_is_atomic_and_nothing_leaks_without_it() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        batch.set("/uuid/a", "1");
        batch.set("/uuid/b", "2");
        drop(batch);
        assert_eq!(client.peek_string("/uuid/a"), None);
        assert_eq!(client.peek_string("/uuid/b"), None);
    }
}
