//! Entity blob shapes stored at `/uuid/{uuid}` and `/uuidv2/{uuid}` (§3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A public-key fingerprint's metadata (`key_info`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attested: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch: Option<bool>,
}

/// Top-level account (`sdcperson`), stored at `/uuid/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "account")]
pub struct Account {
    pub uuid: String,
    pub login: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub approved_for_provisioning: bool,
    #[serde(default)]
    pub triton_cns_enabled: bool,
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    #[serde(default)]
    pub key_info: BTreeMap<String, KeyInfo>,
    #[serde(default)]
    pub accesskeys: BTreeMap<String, String>,
}

impl Account {
    #[must_use]
    pub fn new(uuid: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            login: login.into(),
            groups: Vec::new(),
            approved_for_provisioning: false,
            triton_cns_enabled: false,
            keys: BTreeMap::new(),
            key_info: BTreeMap::new(),
            accesskeys: BTreeMap::new(),
        }
    }
}

/// Sub-user (`sdcaccountuser`), stored at `/uuid/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "user")]
pub struct SubUser {
    pub uuid: String,
    pub account: String,
    pub login: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, rename = "defaultRoles")]
    pub default_roles: Vec<String>,
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    #[serde(default)]
    pub key_info: BTreeMap<String, KeyInfo>,
    #[serde(default)]
    pub accesskeys: BTreeMap<String, String>,
    /// Legacy flat-group membership map (`groupofuniquenames`), distinct
    /// from the per-account `roles` array (§9 "two shapes for groups").
    /// Stored under its own field name so it can never collide with a
    /// sorted-array-valued `groups` field written for the same uuid by
    /// `sdcaccountgroup` or `sdcperson`.
    #[serde(default, rename = "operatorGroups")]
    pub groups: BTreeMap<String, bool>,
}

impl SubUser {
    #[must_use]
    pub fn new(uuid: impl Into<String>, account: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            account: account.into(),
            login: login.into(),
            roles: Vec::new(),
            default_roles: Vec::new(),
            keys: BTreeMap::new(),
            key_info: BTreeMap::new(),
            accesskeys: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }
}

/// Role (`sdcaccountrole`), stored at `/uuidv2/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "role")]
pub struct Role {
    pub uuid: String,
    pub account: String,
    pub name: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub assumerolepolicydocument: Option<String>,
}

impl Role {
    #[must_use]
    pub fn new(uuid: impl Into<String>, account: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            account: account.into(),
            name: name.into(),
            policies: Vec::new(),
            assumerolepolicydocument: None,
        }
    }
}

/// One policy rule, stored as a `[raw, parsed]` 2-element array sorted by
/// `raw` (§3, §8 S5) rather than as an object, so a downstream policy engine
/// can index `rule[0]`/`rule[1]` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "(String, serde_json::Value)", from = "(String, serde_json::Value)")]
pub struct RuleEntry {
    pub raw: String,
    pub parsed: serde_json::Value,
}

impl From<(String, serde_json::Value)> for RuleEntry {
    fn from((raw, parsed): (String, serde_json::Value)) -> Self {
        Self { raw, parsed }
    }
}

impl From<RuleEntry> for (String, serde_json::Value) {
    fn from(entry: RuleEntry) -> Self {
        (entry.raw, entry.parsed)
    }
}

/// Policy (`sdcaccountpolicy`), stored at `/uuidv2/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "policy")]
pub struct Policy {
    pub uuid: String,
    pub account: String,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl Policy {
    #[must_use]
    pub fn new(uuid: impl Into<String>, account: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            account: account.into(),
            name: name.into(),
            rules: Vec::new(),
        }
    }
}

/// Legacy pre-role group (`sdcaccountgroup`), stored at `/uuid/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "group")]
pub struct Group {
    pub uuid: String,
    pub account: String,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Group {
    #[must_use]
    pub fn new(uuid: impl Into<String>, account: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            account: account.into(),
            name: name.into(),
            roles: Vec::new(),
        }
    }
}
