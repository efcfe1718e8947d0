//! `accesskey`: HMAC access-key credentials (§4.3.8).

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry};
use crate::errors::Error;
use serde_json::Value;

use super::require;
use super::sdckey::resolve_owner;

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let changes = &entry.changes;
    let owner = resolve_owner(entry)?;
    let access_key_id = require(changes, "accesskeyid")?.to_string();
    let access_key_secret = require(changes, "accesskeysecret")?.to_string();

    let key = format!("/uuid/{owner}");
    let mut blob = batch.get_json(&key).await?;
    let map = blob.as_object_mut().expect("blob is always an object");
    map.entry("accesskeys")
        .or_insert_with(|| Value::Object(serde_json::Map::new()))
        .as_object_mut()
        .unwrap()
        .insert(access_key_id.clone(), Value::String(access_key_secret));
    batch.set_json(&key, &Value::Object(map.clone()))?;

    batch.set(&format!("/accesskey/{access_key_id}"), owner);
    Ok(())
}

pub async fn modify(_entry: &ChangelogEntry, _batch: &mut Batch<'_>) -> Result<(), Error> {
    // Access keys are replaced wholesale upstream, never edited in place.
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let owner = resolve_owner(entry)?;
    let access_key_id = require(&entry.changes, "accesskeyid")?.to_string();
    let key = format!("/uuid/{owner}");
    let mut blob = batch.get_json(&key).await?;
    if let Some(accesskeys) = blob.as_object_mut().and_then(|m| m.get_mut("accesskeys")).and_then(Value::as_object_mut) {
        accesskeys.remove(&access_key_id);
    }
    batch.set_json(&key, &blob)?;
    batch.del(&format!("/accesskey/{access_key_id}"));
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

    fn add_entry(owner: &str, id: &str) -> ChangelogEntry {
        let mut changes = HashMap::new();
        changes.insert("_owner".to_string(), vec![owner.to_string()]);
        changes.insert("accesskeyid".to_string(), vec![id.to_string()]);
        changes.insert("accesskeysecret".to_string(), vec!["s3cr3t".to_string()]);
        ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("accesskey".to_string()),
            targetdn: format!("accesskeyid={id}, uuid={owner}, ou=users, o=smartdc"),
            changes: Changes::AttributeMap(changes),
            entry: None,
        }
    }

    #[tokio::test]
    async fn add_writes_blob_and_reverse_index() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add(&add_entry("acc-1", "AKIA123"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let blob: Value = serde_json::from_str(&client.peek_string("/uuid/acc-1").unwrap()).unwrap();
        assert_eq!(blob["accesskeys"]["AKIA123"], "s3cr3t");
        assert_eq!(client.peek_string("/accesskey/AKIA123"), Some("acc-1".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_blob_entry_and_reverse_index() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add(&add_entry("acc-1", "AKIA123"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let mut batch = Batch::new(&client);
        delete(&add_entry("acc-1", "AKIA123"), &mut batch).await.unwrap();
        batch.commit().await.unwrap();

        let blob: Value = serde_json::from_str(&client.peek_string("/uuid/acc-1").unwrap()).unwrap();
        assert!(blob["accesskeys"].as_object().unwrap().is_empty());
        assert_eq!(client.peek_string("/accesskey/AKIA123"), None);
    }
}
