//! `sdcaccountuser`: sub-users of an account (§4.3.2).

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry};
use crate::errors::Error;
use crate::types::SubUser;
use serde_json::Value;

use super::{require, require_dn_value};

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let changes = &entry.changes;
    let uuid = require(changes, "uuid")?;
    let account = require(changes, "account")?;
    let login = require(changes, "login")?;
    let user = SubUser::new(uuid, account, login);

    batch.set_json(&format!("/uuid/{uuid}"), &serde_json::to_value(&user)?)?;
    batch.set(&format!("/user/{account}/{login}"), uuid.to_string());
    batch.sadd(&format!("/set/users/{account}"), uuid.to_string());
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
            "login" => {
                let new_login = modification.modification.vals.first().cloned().unwrap_or_default();
                let blob = batch.get_json(&key).await?;
                let account = blob.get("account").and_then(Value::as_str).unwrap_or("").to_string();
                let old_login = blob.get("login").and_then(Value::as_str).unwrap_or("").to_string();
                if !old_login.is_empty() {
                    batch.del(&format!("/user/{account}/{old_login}"));
                }
                batch.set(&format!("/user/{account}/{new_login}"), uuid.clone());
                crate::primitives::set_value(batch, &key, "login", Value::String(new_login)).await?;
            }
            other => {
                tracing::warn!(attribute = other, "sdcaccountuser.modify: unrecognized attribute, ignoring");
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
    let login = blob.get("login").and_then(Value::as_str).map(str::to_string);

    batch.del(&key);
    if let (Some(account), Some(login)) = (&account, &login) {
        batch.del(&format!("/user/{account}/{login}"));
    }
    if let Some(account) = account {
        batch.srem(&format!("/set/users/{account}"), uuid);
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

    fn add_entry(uuid: &str, account: &str, login: &str) -> ChangelogEntry {
        let mut changes = HashMap::new();
        changes.insert("uuid".to_string(), vec![uuid.to_string()]);
        changes.insert("account".to_string(), vec![account.to_string()]);
        changes.insert("login".to_string(), vec![login.to_string()]);
        ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("sdcaccountuser".to_string()),
            targetdn: format!("uuid={uuid}, uuid={account}, ou=users, o=smartdc"),
            changes: Changes::AttributeMap(changes),
            entry: None,
        }
    }

    #[tokio::test]
    async fn add_writes_index_and_account_scoped_membership() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add(&add_entry("sub-1", "acc-1", "bob"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        assert_eq!(client.peek_string("/user/acc-1/bob"), Some("sub-1".to_string()));
        assert!(client.peek_set("/set/users/acc-1").contains("sub-1"));
    }

    #[tokio::test]
    async fn delete_removes_blob_index_and_membership() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add(&add_entry("sub-1", "acc-1", "bob"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let mut batch = Batch::new(&client);
        let del = ChangelogEntry {
            changenumber: "2".to_string(),
            changetype: ChangeType::Delete,
            objectclass: ObjectClass::One("sdcaccountuser".to_string()),
            targetdn: "uuid=sub-1, uuid=acc-1, ou=users, o=smartdc".to_string(),
            changes: Changes::AttributeMap(HashMap::new()),
            entry: None,
        };
        delete(&del, &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        assert_eq!(client.peek_string("/uuid/sub-1"), None);
        assert_eq!(client.peek_string("/user/acc-1/bob"), None);
        assert!(!client.peek_set("/set/users/acc-1").contains("sub-1"));
    }
}
