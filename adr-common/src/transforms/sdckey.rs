//! `sdckey`: public keys attached to an account or sub-user (§4.3.7).

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry};
use crate::errors::Error;
use serde_json::Value;

use super::{parse_ldap_bool, require, require_dn_value};

/// Resolves the owning uuid: the newer `_owner` attribute if present,
/// otherwise DN position 1 (§9 owner-resolution compatibility note).
pub(crate) fn resolve_owner(entry: &ChangelogEntry) -> Result<String, Error> {
    if let Some(owner) = entry.changes.first("_owner") {
        return Ok(owner.to_string());
    }
    require_dn_value(&entry.targetdn, 1).map(str::to_string)
}

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let changes = &entry.changes;
    let owner = resolve_owner(entry)?;
    let fingerprint = require(changes, "fingerprint")?.to_string();
    let pkcs = require(changes, "pkcs")?.to_string();

    let attested = changes.first("attested").map(parse_ldap_bool);
    let pin = changes.first("ykpinrequired").map(parse_ldap_bool);
    let touch = changes.first("yktouchrequired").map(parse_ldap_bool);

    let key = format!("/uuid/{owner}");
    let mut blob = batch.get_json(&key).await?;
    let map = blob.as_object_mut().expect("blob is always an object");
    map.entry("keys")
        .or_insert_with(|| Value::Object(serde_json::Map::new()))
        .as_object_mut()
        .unwrap()
        .insert(fingerprint.clone(), Value::String(pkcs));
    let mut info = serde_json::Map::new();
    if let Some(v) = attested {
        info.insert("attested".to_string(), Value::Bool(v));
    }
    if let Some(v) = pin {
        info.insert("pin".to_string(), Value::Bool(v));
    }
    if let Some(v) = touch {
        info.insert("touch".to_string(), Value::Bool(v));
    }
    map.entry("key_info")
        .or_insert_with(|| Value::Object(serde_json::Map::new()))
        .as_object_mut()
        .unwrap()
        .insert(fingerprint, Value::Object(info));
    batch.set_json(&key, &Value::Object(map.clone()))
}

pub async fn modify(_entry: &ChangelogEntry, _batch: &mut Batch<'_>) -> Result<(), Error> {
    // The fingerprint is identity; upstream always models a key change as
    // delete+add, never an in-place modify.
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let owner = resolve_owner(entry)?;
    let fingerprint = require(&entry.changes, "fingerprint")?.to_string();
    let key = format!("/uuid/{owner}");
    let mut blob = batch.get_json(&key).await?;
    if let Some(map) = blob.as_object_mut() {
        if let Some(keys) = map.get_mut("keys").and_then(Value::as_object_mut) {
            keys.remove(&fingerprint);
        }
        if let Some(info) = map.get_mut("key_info").and_then(Value::as_object_mut) {
            info.remove(&fingerprint);
        }
    }
    batch.set_json(&key, &blob)
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

    fn add_entry(owner: &str, fp: &str) -> ChangelogEntry {
        let mut changes = HashMap::new();
        changes.insert("_owner".to_string(), vec![owner.to_string()]);
        changes.insert("fingerprint".to_string(), vec![fp.to_string()]);
        changes.insert("pkcs".to_string(), vec!["ssh-rsa AAAA...".to_string()]);
        changes.insert("attested".to_string(), vec!["true".to_string()]);
        ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("sdckey".to_string()),
            targetdn: format!("fingerprint={fp}, uuid={owner}, ou=users, o=smartdc"),
            changes: Changes::AttributeMap(changes),
            entry: None,
        }
    }

    #[tokio::test]
    async fn add_sets_key_and_key_info() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add(&add_entry("acc-1", "aa:bb:cc"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let blob: Value = serde_json::from_str(&client.peek_string("/uuid/acc-1").unwrap()).unwrap();
        assert_eq!(blob["keys"]["aa:bb:cc"], "ssh-rsa AAAA...");
        assert_eq!(blob["key_info"]["aa:bb:cc"]["attested"], true);
    }

    #[tokio::test]
    async fn delete_removes_key_and_key_info() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add(&add_entry("acc-1", "aa:bb:cc"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let mut batch = Batch::new(&client);
        let mut changes = HashMap::new();
        changes.insert("_owner".to_string(), vec!["acc-1".to_string()]);
        changes.insert("fingerprint".to_string(), vec!["aa:bb:cc".to_string()]);
        let del = ChangelogEntry {
            changenumber: "2".to_string(),
            changetype: ChangeType::Delete,
            objectclass: ObjectClass::One("sdckey".to_string()),
            targetdn: "fingerprint=aa:bb:cc, uuid=acc-1, ou=users, o=smartdc".to_string(),
            changes: Changes::AttributeMap(changes),
            entry: None,
        };
        delete(&del, &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let blob: Value = serde_json::from_str(&client.peek_string("/uuid/acc-1").unwrap()).unwrap();
        assert!(blob["keys"].as_object().unwrap().is_empty());
        assert!(blob["key_info"].as_object().unwrap().is_empty());
    }
}
