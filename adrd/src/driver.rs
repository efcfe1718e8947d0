//! Outer driver (§2 item 6, §5): pulls changelog entries in changenumber
//! order, dispatches each to its transform, commits the batch, and advances
//! the persisted cursor.

use std::time::{Duration, Instant};

use adr_common::batch::Batch;
use adr_common::changelog::ChangelogSource;
use adr_common::errors::Error;
use adr_common::kv::KvClient;
use adr_common::parser::RuleParser;

use crate::cursor::CursorStore;
use crate::metrics;

/// Bounded exponential backoff applied to retried KV-transport errors.
const RETRY_BASE: Duration = Duration::from_millis(200);
const RETRY_MAX_ATTEMPTS: u32 = 5;

pub struct Driver<'a> {
    changelog: &'a dyn ChangelogSource,
    kv: &'a dyn KvClient,
    parser: &'a dyn RuleParser,
    cursor: &'a dyn CursorStore,
}

/// Outcome of one `step()` call.
#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An entry was applied and the cursor advanced.
    Applied(i64),
    /// No entry beyond the current cursor is available yet.
    Idle,
}

impl<'a> Driver<'a> {
    #[must_use]
    pub fn new(changelog: &'a dyn ChangelogSource, kv: &'a dyn KvClient, parser: &'a dyn RuleParser, cursor: &'a dyn CursorStore) -> Self {
        Self { changelog, kv, parser, cursor }
    }

    /// Applies at most one changelog entry beyond the current cursor.
    ///
    /// KV-transport errors are retried with bounded backoff (the entry is
    /// replayed from scratch each attempt, since nothing was committed);
    /// changelog-shape errors are propagated so the caller can halt (§7).
    pub async fn step(&self) -> Result<StepOutcome, Error> {
        let after = self.cursor.load()?.unwrap_or(0);
        let Some(entry) = self.changelog.next_after(after).await? else {
            return Ok(StepOutcome::Idle);
        };

        let mut attempt = 0;
        loop {
            let mut batch = Batch::new(self.kv);
            let result = adr_common::dispatch(&entry, &mut batch, self.parser).await;
            match result {
                Ok(()) => {
                    let start = Instant::now();
                    let commit = batch.commit().await;
                    match commit {
                        Ok(()) => {
                            metrics::observe_commit(start.elapsed().as_secs_f64(), "ok");
                            metrics::observe_entry("applied");
                            let changenumber = entry.changenumber_value().map_err(|_| {
                                Error::ChangelogShape(
                                    adr_common::errors::ErrorCode::ChangelogInvalidValue,
                                    entry.changenumber.clone(),
                                )
                            })?;
                            self.cursor.store(changenumber)?;
                            return Ok(StepOutcome::Applied(changenumber));
                        }
                        Err(e) if e.is_retryable() && attempt < RETRY_MAX_ATTEMPTS => {
                            metrics::observe_commit(start.elapsed().as_secs_f64(), "retry");
                            attempt += 1;
                            tokio::time::sleep(RETRY_BASE * attempt).await;
                            continue;
                        }
                        Err(e) => {
                            metrics::observe_commit(start.elapsed().as_secs_f64(), "failed");
                            metrics::observe_entry("failed");
                            return Err(e);
                        }
                    }
                }
                Err(e) if e.is_retryable() && attempt < RETRY_MAX_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BASE * attempt).await;
                    continue;
                }
                Err(e) => {
                    metrics::observe_entry("failed");
                    return Err(e);
                }
            }
        }
    }

    /// Runs `step()` in a loop, sleeping `poll_interval` whenever the
    /// changelog is idle. Returns (halts) on the first non-retryable error.
    pub async fn run_forever(&self, poll_interval: Duration) -> Result<(), Error> {
        loop {
            match self.step().await {
                Ok(StepOutcome::Applied(changenumber)) => {
                    tracing::info!(changenumber, "applied changelog entry");
                }
                Ok(StepOutcome::Idle) => {
                    tokio::time::sleep(poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "halting: non-retryable error applying changelog entry");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adr_common::changelog::{ChangeType, ChangelogEntry, Changes, InMemoryChangelogSource, ObjectClass};
    use adr_common::kv::InMemoryKvClient;
    use adr_common::parser::PassthroughRuleParser;
    use std::collections::HashMap;

    fn account_entry(changenumber: &str, login: &str) -> ChangelogEntry {
        let mut changes = HashMap::new();
        changes.insert("uuid".to_string(), vec![format!("uuid-{login}")]);
        changes.insert("login".to_string(), vec![login.to_string()]);
        ChangelogEntry {
            changenumber: changenumber.to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("sdcperson".to_string()),
            targetdn: format!("uuid=uuid-{login}, ou=users, o=smartdc"),
            changes: Changes::AttributeMap(changes),
            entry: None,
        }
    }

    #[tokio::test]
    async fn step_applies_one_entry_and_advances_cursor() {
        let changelog = InMemoryChangelogSource::new(vec![account_entry("1", "alice"), account_entry("2", "bob")]);
        let kv = InMemoryKvClient::new();
        let parser = PassthroughRuleParser;
        let cursor = crate::cursor::InMemoryCursorStore::new();
        let driver = Driver::new(&changelog, &kv, &parser, &cursor);

        assert_eq!(driver.step().await.unwrap(), StepOutcome::Applied(1));
        assert_eq!(cursor.load().unwrap(), Some(1));
        assert_eq!(kv.peek_string("/account/alice"), Some("uuid-alice".to_string()));

        assert_eq!(driver.step().await.unwrap(), StepOutcome::Applied(2));
        assert_eq!(cursor.load().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn step_is_idle_once_the_changelog_is_exhausted() {
        let changelog = InMemoryChangelogSource::new(vec![account_entry("1", "alice")]);
        let kv = InMemoryKvClient::new();
        let parser = PassthroughRuleParser;
        let cursor = crate::cursor::InMemoryCursorStore::new();
        let driver = Driver::new(&changelog, &kv, &parser, &cursor);

        driver.step().await.unwrap();
        assert_eq!(driver.step().await.unwrap(), StepOutcome::Idle);
    }

    #[tokio::test]
    async fn run_forever_halts_on_a_non_retryable_error() {
        let mut changes = HashMap::new();
        changes.insert("login".to_string(), vec!["nouuid".to_string()]);
        let bad = ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("sdcperson".to_string()),
            targetdn: "uuid=x, ou=users, o=smartdc".to_string(),
            changes: Changes::AttributeMap(changes),
            entry: None,
        };
        let changelog = InMemoryChangelogSource::new(vec![bad]);
        let kv = InMemoryKvClient::new();
        let parser = PassthroughRuleParser;
        let cursor = crate::cursor::InMemoryCursorStore::new();
        let driver = Driver::new(&changelog, &kv, &parser, &cursor);

        let result = driver.run_forever(Duration::from_millis(1)).await;
        assert!(result.is_err());
    }
}
