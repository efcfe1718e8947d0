//! `sdcaccountpolicy`: RBAC policies (§4.3.4).

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry, ModOperation};
use crate::errors::Error;
use crate::parser::RuleParser;
use crate::types::{Policy, RuleEntry};
use serde_json::Value;

use super::{require, require_dn_value};

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>, parser: &dyn RuleParser) -> Result<(), Error> {
    let changes = &entry.changes;
    let uuid = require(changes, "uuid")?;
    let account = require(changes, "account")?;
    let name = require(changes, "name")?;

    let mut policy = Policy::new(uuid, account, name);
    for raw in changes.all("rule") {
        let parsed = parser.parse(raw)?;
        policy.rules.push(RuleEntry { raw: raw.clone(), parsed });
    }
    policy.rules.sort_by(|a, b| a.raw.cmp(&b.raw));

    let key = format!("/uuidv2/{uuid}");
    batch.set_json(&key, &serde_json::to_value(&policy)?)?;
    batch.set(&format!("/policy/{account}/{name}"), uuid.to_string());
    batch.sadd(&format!("/set/policies/{account}"), uuid.to_string());

    for role_dn in changes.all("memberrole") {
        let role_uuid = require_dn_value(role_dn, 0)?;
        crate::primitives::add_to_sorted_set(
            batch,
            &format!("/uuidv2/{role_uuid}"),
            "policies",
            Value::String(uuid.to_string()),
        )
        .await?;
    }
    Ok(())
}

fn rule_entries(vals: &[String], parser: &dyn RuleParser) -> Result<Vec<Value>, Error> {
    vals.iter()
        .map(|raw| {
            let parsed = parser.parse(raw)?;
            Ok(serde_json::to_value(RuleEntry { raw: raw.clone(), parsed })?)
        })
        .collect()
}

pub async fn modify(entry: &ChangelogEntry, batch: &mut Batch<'_>, parser: &dyn RuleParser) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuidv2/{uuid}");
    let Some(mods) = entry.changes.as_modifications() else {
        return Ok(());
    };

    for modification in mods {
        let op = &modification.operation;
        let vals = &modification.modification.vals;
        match modification.modification.attr_type.as_str() {
            "name" => {
                let new_name = vals.first().cloned().unwrap_or_default();
                crate::primitives::rename(batch, &key, "policy", &new_name).await?;
            }
            "rule" => match op {
                ModOperation::Add => {
                    let elements = rule_entries(vals, parser)?;
                    crate::primitives::set_union(batch, &key, "rules", elements).await?;
                }
                ModOperation::Delete => {
                    let elements = rule_entries(vals, parser)?;
                    crate::primitives::set_difference(batch, &key, "rules", &elements).await?;
                }
                ModOperation::Replace => {
                    let elements = rule_entries(vals, parser)?;
                    crate::primitives::set_value(batch, &key, "rules", Value::Array(elements)).await?;
                }
            },
            "memberrole" => {
                for dn in vals {
                    let role_uuid = require_dn_value(dn, 0)?;
                    let role_key = format!("/uuidv2/{role_uuid}");
                    match op {
                        ModOperation::Add => {
                            crate::primitives::add_to_sorted_set(batch, &role_key, "policies", Value::String(uuid.clone()))
                                .await?
                        }
                        ModOperation::Delete => {
                            crate::primitives::del_from_sorted_set(batch, &role_key, "policies", &uuid).await?
                        }
                        ModOperation::Replace => {
                            crate::primitives::add_to_sorted_set(batch, &role_key, "policies", Value::String(uuid.clone()))
                                .await?
                        }
                    }
                }
            }
            other => {
                tracing::warn!(attribute = other, "sdcaccountpolicy.modify: unrecognized attribute, ignoring");
            }
        }
    }
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuidv2/{uuid}");
    let blob = batch.get_json(&key).await?;
    // account is read as `changes.account[0]`, not the raw list wrapper (§9).
    let account = entry
        .changes
        .first("account")
        .map(str::to_string)
        .or_else(|| blob.get("account").and_then(Value::as_str).map(str::to_string));
    let name = blob.get("name").and_then(Value::as_str).map(str::to_string);

    batch.del(&key);
    if let (Some(account), Some(name)) = (&account, &name) {
        batch.del(&format!("/policy/{account}/{name}"));
    }
    if let Some(account) = &account {
        batch.srem(&format!("/set/policies/{account}"), uuid.clone());
    }

    for role_dn in entry.changes.all("memberrole") {
        let role_uuid = require_dn_value(role_dn, 0)?;
        crate::primitives::del_from_sorted_set(batch, &format!("/uuidv2/{role_uuid}"), "policies", &uuid).await?;
    }
    Ok(())
}

pub async fn handle(
    changetype: ChangeType,
    entry: &ChangelogEntry,
    batch: &mut Batch<'_>,
    parser: &dyn RuleParser,
) -> Result<(), Error> {
    match changetype {
        ChangeType::Add => add(entry, batch, parser).await,
        ChangeType::Modify => modify(entry, batch, parser).await,
        ChangeType::Delete => delete(entry, batch).await,
    }
}
