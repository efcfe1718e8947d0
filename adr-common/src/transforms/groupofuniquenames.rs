//! `groupofuniquenames`: operator-style flat groups (§4.3.6). The legacy
//! map-backed membership shape (`{groupName: true}`) is written to its own
//! `operatorGroups` field rather than `groups`, so it can never collide with
//! the sorted-array `groups` field [`super::sdcaccountgroup`] and `sdcperson`
//! write on the same `/uuid/{uuid}` blob — preserved for compatibility with
//! operator-check consumers.

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry, ModOperation};
use crate::errors::Error;

use super::require_dn_value;

fn group_name(entry: &ChangelogEntry) -> Result<&str, Error> {
    require_dn_value(&entry.targetdn, 0)
}

pub async fn add(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let name = group_name(entry)?.to_string();
    for member_dn in entry.changes.all("uniquemember") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::add_to_map(batch, &format!("/uuid/{user_uuid}"), "operatorGroups", &name).await?;
    }
    Ok(())
}

pub async fn modify(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let name = group_name(entry)?.to_string();
    let Some(mods) = entry.changes.as_modifications() else {
        return Ok(());
    };

    for modification in mods {
        if modification.modification.attr_type != "uniquemember" {
            tracing::warn!(
                attribute = %modification.modification.attr_type,
                "groupofuniquenames.modify: unrecognized attribute, ignoring"
            );
            continue;
        }
        for dn in &modification.modification.vals {
            let user_uuid = require_dn_value(dn, 0)?;
            let user_key = format!("/uuid/{user_uuid}");
            match modification.operation {
                ModOperation::Add | ModOperation::Replace => {
                    crate::primitives::add_to_map(batch, &user_key, "operatorGroups", &name).await?;
                }
                ModOperation::Delete => {
                    crate::primitives::del_from_map(batch, &user_key, "operatorGroups", &name).await?;
                }
            }
        }
    }
    Ok(())
}

pub async fn delete(entry: &ChangelogEntry, batch: &mut Batch<'_>) -> Result<(), Error> {
    let name = group_name(entry)?.to_string();
    for member_dn in entry.changes.all("uniquemember") {
        let user_uuid = require_dn_value(member_dn, 0)?;
        crate::primitives::del_from_map(batch, &format!("/uuid/{user_uuid}"), "operatorGroups", &name).await?;
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
    use serde_json::Value;

    #[tokio::test]
    async fn add_with_no_members_is_a_noop_that_succeeds() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        let entry = ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("groupofuniquenames".to_string()),
            targetdn: "cn=operators, ou=groups, o=smartdc".to_string(),
            changes: Changes::AttributeMap(HashMap::new()),
            entry: None,
        };
        add(&entry, &mut batch).await.unwrap();
        assert_eq!(batch.pending(), 0);
    }

    #[tokio::test]
    async fn add_sets_map_membership_for_each_user() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        let mut changes = HashMap::new();
        changes.insert(
            "uniquemember".to_string(),
            vec!["uuid=sub-1, uuid=acc-1, ou=users, o=smartdc".to_string()],
        );
        let entry = ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass: ObjectClass::One("groupofuniquenames".to_string()),
            targetdn: "cn=operators, ou=groups, o=smartdc".to_string(),
            changes: Changes::AttributeMap(changes),
            entry: None,
        };
        add(&entry, &mut batch).await.unwrap();
        let blob = batch.get_json("/uuid/sub-1").await.unwrap();
        assert_eq!(blob["operatorGroups"]["operators"], Value::Bool(true));
    }
}
