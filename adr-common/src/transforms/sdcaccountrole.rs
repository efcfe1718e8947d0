//! `sdcaccountrole`: RBAC roles (§4.3.3).

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry, ModOperation};
use crate::dn::dn_value;
use crate::errors::Error;
use crate::types::Role;
use serde_json::Value;

use super::{require, require_dn_value};

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let changes = &entry.changes;
    let uuid = require(changes, "uuid")?;
    let account = require(changes, "account")?;
    let name = require(changes, "name")?;
    let mut role = Role::new(uuid, account, name);
    role.assumerolepolicydocument = changes.first("assumerolepolicydocument").map(str::to_string);

    let key = format!("/uuidv2/{uuid}");
    batch.set_json(&key, &serde_json::to_value(&role)?)?;
    batch.set(&format!("/role/{account}/{name}"), uuid.to_string());
    batch.sadd(&format!("/set/roles/{account}"), uuid.to_string());

    for member_dn in changes.all("uniquemember") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::add_to_sorted_set(
            batch,
            &format!("/uuid/{user_uuid}"),
            "roles",
            Value::String(uuid.to_string()),
        )
        .await?;
    }
    for member_dn in changes.all("uniquememberdefault") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::add_to_sorted_set(
            batch,
            &format!("/uuid/{user_uuid}"),
            "defaultRoles",
            Value::String(uuid.to_string()),
        )
        .await?;
    }
    Ok(())
}

fn dn_uuids(vals: &[String]) -> Vec<Value> {
    let mut elements: Vec<Value> = vals
        .iter()
        .filter_map(|dn| dn_value(dn, 0))
        .map(|u| Value::String(u.to_string()))
        .collect();
    elements.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    elements
}

pub async fn modify(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
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
                crate::primitives::rename(batch, &key, "role", &new_name).await?;
            }
            "memberpolicy" => {
                let elements = dn_uuids(vals);
                match op {
                    ModOperation::Add => crate::primitives::set_union(batch, &key, "policies", elements).await?,
                    ModOperation::Delete => crate::primitives::set_difference(batch, &key, "policies", &elements).await?,
                    ModOperation::Replace => crate::primitives::set_value(batch, &key, "policies", Value::Array(elements)).await?,
                }
            }
            "uniquemember" => {
                for dn in vals {
                    let user_uuid = require_dn_value(dn, 0)?;
                    let user_key = format!("/uuid/{user_uuid}");
                    match op {
                        ModOperation::Add => {
                            crate::primitives::add_to_sorted_set(batch, &user_key, "roles", Value::String(uuid.clone())).await?
                        }
                        ModOperation::Delete => {
                            crate::primitives::del_from_sorted_set(batch, &user_key, "roles", &uuid).await?
                        }
                        ModOperation::Replace => {
                            crate::primitives::add_to_sorted_set(batch, &user_key, "roles", Value::String(uuid.clone())).await?
                        }
                    }
                }
            }
            "uniquememberdefault" => {
                for dn in vals {
                    let user_uuid = require_dn_value(dn, 0)?;
                    let user_key = format!("/uuid/{user_uuid}");
                    match op {
                        ModOperation::Add => {
                            crate::primitives::add_to_sorted_set(batch, &user_key, "defaultRoles", Value::String(uuid.clone()))
                                .await?
                        }
                        ModOperation::Delete => {
                            crate::primitives::del_from_sorted_set(batch, &user_key, "defaultRoles", &uuid).await?
                        }
                        ModOperation::Replace => {
                            crate::primitives::add_to_sorted_set(batch, &user_key, "defaultRoles", Value::String(uuid.clone()))
                                .await?
                        }
                    }
                }
            }
            "assumerolepolicydocument" => match op {
                ModOperation::Add | ModOperation::Replace => {
                    let doc = vals.first().cloned().unwrap_or_default();
                    crate::primitives::set_value(batch, &key, "assumerolepolicydocument", Value::String(doc)).await?;
                }
                ModOperation::Delete => {
                    crate::primitives::set_value(batch, &key, "assumerolepolicydocument", Value::Null).await?;
                }
            },
            other => {
                tracing::warn!(attribute = other, "sdcaccountrole.modify: unrecognized attribute, ignoring");
            }
        }
    }
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuidv2/{uuid}");
    let blob = batch.get_json(&key).await?;
    let account = blob.get("account").and_then(Value::as_str).map(str::to_string);
    let name = blob.get("name").and_then(Value::as_str).map(str::to_string);

    batch.del(&key);
    if let (Some(account), Some(name)) = (&account, &name) {
        batch.del(&format!("/role/{account}/{name}"));
    }
    if let Some(account) = account {
        batch.srem(&format!("/set/roles/{account}"), uuid.clone());
    }

    for member_dn in entry.changes.all("uniquemember") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::del_from_sorted_set(batch, &format!("/uuid/{user_uuid}"), "roles", &uuid).await?;
    }
    for member_dn in entry.changes.all("uniquememberdefault") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::del_from_sorted_set(batch, &format!("/uuid/{user_uuid}"), "defaultRoles", &uuid).await?;
    }
    Ok(())
}

pub async fn handle(changetype: ChangeType, entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    match changetype {
        ChangeType::Add => add(entry, batch).await,
        ChangeType::Modify => modify(entry, batch).await,
        ChangeType::Delete => delete(entry, batch).await,
    }
}
