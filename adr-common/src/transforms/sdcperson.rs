//! `sdcperson`: the top-level account (§4.3.1).

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry, ModOperation};
use crate::errors::Error;
use crate::types::Account;
use serde_json::Value;

use super::{parse_ldap_bool, require, require_dn_value};

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let changes = &entry.changes;
    let uuid = require(changes, "uuid")?;
    let login = require(changes, "login")?;
    let mut account = Account::new(uuid, login);
    account.approved_for_provisioning = changes
        .first("approved_for_provisioning")
        .map(parse_ldap_bool)
        .unwrap_or(false);
    account.triton_cns_enabled = changes.first("triton_cns_enabled").map(parse_ldap_bool).unwrap_or(false);

    let key = format!("/uuid/{uuid}");
    batch.set_json(&key, &serde_json::to_value(&account)?)?;
    batch.set(&format!("/account/{login}"), uuid.to_string());
    batch.sadd("/set/accounts", uuid.to_string());
    Ok(())
}

pub async fn modify(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuid/{uuid}");
    let Some(mods) = entry.changes.as_modifications() else {
        return Ok(());
    };

    for modification in mods {
        match modification.modification.attr_type.as_str() {
            attr @ ("approved_for_provisioning" | "triton_cns_enabled") => {
                let value = if modification.operation == ModOperation::Delete {
                    false
                } else {
                    modification
                        .modification
                        .vals
                        .first()
                        .map(|v| parse_ldap_bool(v))
                        .unwrap_or(false)
                };
                crate::primitives::set_value(batch, &key, attr, Value::Bool(value)).await?;
            }
            "login" => {
                let new_login = modification.modification.vals.first().cloned().unwrap_or_default();
                let blob = batch.get_json(&key).await?;
                let old_login = blob.get("login").and_then(Value::as_str).unwrap_or("").to_string();
                if !old_login.is_empty() {
                    batch.del(&format!("/account/{old_login}"));
                }
                batch.set(&format!("/account/{new_login}"), uuid.clone());
                crate::primitives::set_value(batch, &key, "login", Value::String(new_login)).await?;
            }
            other => {
                tracing::warn!(attribute = other, "sdcperson.modify: unrecognized attribute, ignoring");
            }
        }
    }
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuid/{uuid}");
    let blob = batch.get_json(&key).await?;
    let login = blob.get("login").and_then(Value::as_str).map(str::to_string);

    batch.del(&key);
    if let Some(login) = login {
        batch.del(&format!("/account/{login}"));
    }
    batch.srem("/set/accounts", uuid.clone());
    batch.del(&format!("/set/users/{uuid}"));
    batch.del(&format!("/set/policies/{uuid}"));
    batch.del(&format!("/set/roles/{uuid}"));
    Ok(())
}

/// Dispatch entry point used by [`super::dispatch`].
pub async fn handle(changetype: ChangeType, entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    match changetype {
        ChangeType::Add => add(entry, batch).await,
        ChangeType::Modify => modify(entry, batch).await,
        ChangeType::Delete => delete(entry, batch).await,
    }
}
