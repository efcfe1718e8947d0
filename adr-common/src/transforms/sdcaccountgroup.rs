//! `sdcaccountgroup`: legacy, pre-role groups (§4.3.5). Mirrors
//! [`super::sdcaccountrole`] but lives in the v1 `/uuid/…` namespace and uses
//! `cn` as its name attribute.

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry, ModOperation};
use crate::errors::Error;
use crate::types::Group;
use serde_json::Value;

use super::{require, require_dn_value};

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let changes = &entry.changes;
    let uuid = require(changes, "uuid")?;
    let account = require(changes, "account")?;
    let name = require(changes, "cn")?;
    let group = Group::new(uuid, account, name);

    let key = format!("/uuid/{uuid}");
    batch.set_json(&key, &serde_json::to_value(&group)?)?;
    batch.set(&format!("/group/{account}/{name}"), uuid.to_string());
    batch.sadd(&format!("/set/groups/{account}"), uuid.to_string());

    for member_dn in changes.all("uniquemember") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::add_to_sorted_set(
            batch,
            &format!("/uuid/{user_uuid}"),
            "groups",
            Value::String(uuid.to_string()),
        )
        .await?;
    }
    Ok(())
}

pub async fn modify(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuid/{uuid}");
    let Some(mods) = entry.changes.as_modifications() else {
        return Ok(());
    };

    for modification in mods {
        let op = &modification.operation;
        let vals = &modification.modification.vals;
        match modification.modification.attr_type.as_str() {
            "cn" => {
                let new_name = vals.first().cloned().unwrap_or_default();
                crate::primitives::rename(batch, &key, "group", &new_name).await?;
            }
            "memberrole" => {
                let elements: Vec<Value> = vals.iter().cloned().map(Value::String).collect();
                match op {
                    ModOperation::Add => crate::primitives::set_union(batch, &key, "roles", elements).await?,
                    ModOperation::Delete => crate::primitives::set_difference(batch, &key, "roles", &elements).await?,
                    ModOperation::Replace => crate::primitives::set_value(batch, &key, "roles", Value::Array(elements)).await?,
                }
            }
            "uniquemember" => {
                for dn in vals {
                    let user_uuid = require_dn_value(dn, 0)?;
                    let user_key = format!("/uuid/{user_uuid}");
                    match op {
                        ModOperation::Add => {
                            crate::primitives::add_to_sorted_set(batch, &user_key, "groups", Value::String(uuid.clone())).await?
                        }
                        ModOperation::Delete => {
                            crate::primitives::del_from_sorted_set(batch, &user_key, "groups", &uuid).await?
                        }
                        ModOperation::Replace => {
                            crate::primitives::add_to_sorted_set(batch, &user_key, "groups", Value::String(uuid.clone())).await?
                        }
                    }
                }
            }
            other => {
                tracing::warn!(attribute = other, "sdcaccountgroup.modify: unrecognized attribute, ignoring");
            }
        }
    }
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let uuid = require_dn_value(&entry.targetdn, 0)?.to_string();
    let key = format!("/uuid/{uuid}");
    let blob = batch.get_json(&key).await?;
    let account = blob.get("account").and_then(Value::as_str).map(str::to_string);
    let name = blob.get("name").and_then(Value::as_str).map(str::to_string);

    batch.del(&key);
    if let (Some(account), Some(name)) = (&account, &name) {
        batch.del(&format!("/group/{account}/{name}"));
    }
    if let Some(account) = account {
        batch.srem(&format!("/set/groups/{account}"), uuid.clone());
    }

    for member_dn in entry.changes.all("uniquemember") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::del_from_sorted_set(batch, &format!("/uuid/{user_uuid}"), "groups", &uuid).await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::{Changes, ObjectClass};
    use crate::kv::InMemoryKvClient;
    use std::collections::HashMap;

    #[tokio::test]
    async fn add_writes_group_and_member_groups() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        let mut changes = HashMap::new();
        changes.insert("uuid".to_string(), vec!["grp-1".to_string()]);
        changes.insert("account".to_string(), vec!["acc-1".to_string()]);
        changes.insert("cn".to_string(), vec!["legacy-admins".to_string()]);
        changes.insert(
            "uniquemember".to_string(),
            vec!["uuid=sub-1, uuid=acc-1, ou=users, o=smartdc".to_string()],
        );
        let entry = ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("sdcaccountgroup".to_string()),
            targetdn: "uuid=grp-1, uuid=acc-1, ou=users, o=smartdc".to_string(),
            changes: Changes::AttributeMap(changes),
            entry: None,
        };
        add(&entry, &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        assert_eq!(client.peek_string("/group/acc-1/legacy-admins"), Some("grp-1".to_string()));
        let sub_blob: Value = serde_json::from_str(&client.peek_string("/uuid/sub-1").unwrap()).unwrap();
        assert_eq!(sub_blob["groups"], serde_json::json!(["grp-1"]));
    }
}
