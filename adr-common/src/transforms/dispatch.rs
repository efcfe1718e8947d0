//! Transform dispatcher (§4.4): selects a transform by `objectclass` and
//! invokes it by `changetype`.

use crate::batch::Batch;
use crate::changelog::{ChangeType, ChangelogEntry};
use crate::errors::Error;
use crate::parser::RuleParser;

/// Classes recognized by this dispatcher, most specific first. When an
/// entry's `objectclass` lists more than one recognized class (e.g. a
/// combined `sdcaccountuser`+`sdcperson` sub-user object), the first match
/// in this order wins.
const PRIORITY: &[&str] = &[
    "sdcaccountuser",
    "sdcperson",
    "sdcaccountrole",
    "sdcaccountpolicy",
    "sdcaccountgroup",
    "groupofuniquenames",
    "sdckey",
    "accesskey",
];

fn select(entry: &ChangelogEntry) -> Option<&'static str> {
    let classes = entry.objectclass.classes();
    PRIORITY.iter().copied().find(|candidate| classes.iter().any(|c| c == candidate))
}

/// Routes one changelog entry to its transform, staging mutations against
/// `batch`. Unknown object classes are skipped with a warning (`Ok(())`).
pub async fn dispatch(entry: &ChangelogEntry, batch: &mut Batch<'_>, parser: &dyn RuleParser) -> Result<(), Error> {
    let changetype = entry.changetype;
    match select(entry) {
        Some("sdcperson") => super::sdcperson::handle(changetype, entry, batch).await,
        Some("sdcaccountuser") => super::sdcaccountuser::handle(changetype, entry, batch).await,
        Some("sdcaccountrole") => super::sdcaccountrole::handle(changetype, entry, batch).await,
        Some("sdcaccountpolicy") => super::sdcaccountpolicy::handle(changetype, entry, batch, parser).await,
        Some("sdcaccountgroup") => super::sdcaccountgroup::handle(changetype, entry, batch).await,
        Some("groupofuniquenames") => super::groupofuniquenames::handle(changetype, entry, batch).await,
        Some("sdckey") => super::sdckey::handle(changetype, entry, batch).await,
        Some("accesskey") => super::accesskey::handle(changetype, entry, batch).await,
        _ => {
            tracing::warn!(
                objectclass = ?entry.objectclass.classes(),
                changenumber = %entry.changenumber,
                "no transform for objectclass, skipping entry"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::{ChangeType, Changes, ObjectClass};
    use crate::kv::InMemoryKvClient;
    use crate::parser::PassthroughRuleParser;
    use std::collections::HashMap;

    fn entry(objectclass: ObjectClass) -> ChangelogEntry {
        let mut changes = HashMap::new();
        changes.insert("uuid".to_string(), vec!["sub-1".to_string()]);
        changes.insert("account".to_string(), vec!["acc-1".to_string()]);
        changes.insert("login".to_string(), vec!["carol".to_string()]);
        ChangelogEntry {
            changenumber: "1".to_string(),
            changetype: ChangeType::Add,
            objectclass,
            targetdn: "uuid=sub-1, uuid=acc-1, ou=users, o=smartdc".to_string(),
            changes: Changes::AttributeMap(changes),
            entry: None,
        }
    }

    #[tokio::test]
    async fn combined_object_class_prefers_the_more_specific_transform() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        let combined = ObjectClass::Many(vec!["sdcaccountuser".to_string(), "sdcperson".to_string()]);
        dispatch(&entry(combined), &mut batch, &PassthroughRuleParser).await.unwrap();
        batch.commit().await.unwrap();

        // sdcaccountuser.add writes /user/{account}/{login}, not /account/{login}
        assert_eq!(client.peek_string("/user/acc-1/carol"), Some("sub-1".to_string()));
        assert_eq!(client.peek_string("/account/carol"), None);
    }

    #[tokio::test]
    async fn unknown_objectclass_is_skipped_with_a_warning() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        let unknown = entry(ObjectClass::One("somethingelse".to_string()));
        dispatch(&unknown, &mut batch, &PassthroughRuleParser).await.unwrap();
        assert_eq!(batch.pending(), 0);
    }
}
