//! Changelog entry format (§6) and the source trait the outer driver polls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `changetype` of a changelog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Modify,
    Delete,
}

/// One modification operation within a `modify` entry's `changes` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModOperation {
    Add,
    Delete,
    Replace,
}

/// A single `{operation, modification: {type, vals}}` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub operation: ModOperation,
    #[serde(rename = "modification")]
    pub modification: ModificationBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationBody {
    #[serde(rename = "type")]
    pub attr_type: String,
    pub vals: Vec<String>,
}

/// The `objectclass` field, which may arrive as a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectClass {
    One(String),
    Many(Vec<String>),
}

impl ObjectClass {
    /// All classes named by this field, lowercased.
    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        match self {
            Self::One(c) => vec![c.to_lowercase()],
            Self::Many(cs) => cs.iter().map(|c| c.to_lowercase()).collect(),
        }
    }
}

/// The `changes` payload, shaped differently for add/delete vs. modify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Changes {
    /// `add`/`delete`: attribute name to list of values.
    AttributeMap(HashMap<String, Vec<String>>),
    /// `modify`: ordered list of operations.
    Modifications(Vec<Modification>),
}

impl Changes {
    /// Returns the attribute map form, if this is one.
    #[must_use]
    pub fn as_attribute_map(&self) -> Option<&HashMap<String, Vec<String>>> {
        match self {
            Self::AttributeMap(m) => Some(m),
            Self::Modifications(_) => None,
        }
    }

    /// Returns the modification-list form, if this is one.
    #[must_use]
    pub fn as_modifications(&self) -> Option<&[Modification]> {
        match self {
            Self::Modifications(m) => Some(m),
            Self::AttributeMap(_) => None,
        }
    }

    /// Looks up the first value of an attribute in the add/delete attribute
    /// map form.
    #[must_use]
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.as_attribute_map()?.get(attr)?.first().map(String::as_str)
    }

    /// Looks up all values of an attribute in the add/delete attribute map
    /// form.
    #[must_use]
    pub fn all(&self, attr: &str) -> &[String] {
        self.as_attribute_map()
            .and_then(|m| m.get(attr))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// One atomic change produced by the directory, with a monotonic
/// `changenumber` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub changenumber: String,
    pub changetype: ChangeType,
    pub objectclass: ObjectClass,
    pub targetdn: String,
    pub changes: Changes,
    /// For `modify`: the post-image attribute map ("mod_entry").
    #[serde(default)]
    pub entry: Option<HashMap<String, serde_json::Value>>,
}

impl ChangelogEntry {
    /// The entry's changenumber parsed as an integer, for cursor comparisons.
    pub fn changenumber_value(&self) -> Result<i64, std::num::ParseIntError> {
        self.changenumber.parse()
    }
}

/// The external directory-changelog collaborator (non-goal: a real LDAP
/// tailer is out of scope; this trait is the boundary the outer driver polls
/// against, and a fake in-memory implementation backs the test suite).
#[async_trait::async_trait]
pub trait ChangelogSource: Send + Sync {
    /// Returns the next entry with `changenumber` strictly greater than
    /// `after`, if one is available yet.
    async fn next_after(&self, after: i64) -> Result<Option<ChangelogEntry>, crate::errors::Error>;

    /// The newest changenumber the directory has available, for `/healthz`
    /// lag reporting. `Ok(None)` if the collaborator doesn't track this.
    async fn newest_changenumber(&self) -> Result<Option<i64>, crate::errors::Error> {
        Ok(None)
    }
}

/// An in-memory `ChangelogSource` backed by a fixed, pre-sorted vector of
/// entries. Used by integration tests and the `adrd` CLI's dry-run mode.
pub struct InMemoryChangelogSource {
    entries: Vec<ChangelogEntry>,
}

impl InMemoryChangelogSource {
    #[must_use]
    pub fn new(entries: Vec<ChangelogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait::async_trait]
impl ChangelogSource for InMemoryChangelogSource {
    async fn next_after(&self, after: i64) -> Result<Option<ChangelogEntry>, crate::errors::Error> {
        Ok(self
            .entries
            .iter()
            .find(|e| e.changenumber_value().map(|n| n > after).unwrap_or(false))
            .cloned())
    }

    async fn newest_changenumber(&self) -> Result<Option<i64>, crate::errors::Error> {
        Ok(self.entries.iter().filter_map(|e| e.changenumber_value().ok()).max())
    }
}
