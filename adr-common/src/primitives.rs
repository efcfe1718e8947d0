//! KV primitives (§4.2): the small set of read-modify-write operations every
//! object-class transform is built from. Each takes a `&mut Batch` plus
//! operation-specific inputs and stages its writes without committing.

use crate::batch::Batch;
use crate::errors::Error;
use serde_json::{Map, Value};

/// Extracts the sort key from an element of a sorted-array-set. Plain string
/// elements (uuids) sort on themselves; rule tuples `[raw, parsed]` sort on
/// `raw` only (§4.2).
fn sort_key(element: &Value) -> &str {
    if let Some(s) = element.as_str() {
        return s;
    }
    element.get(0).and_then(Value::as_str).unwrap_or("")
}

fn array_field<'a>(blob: &'a mut Map<String, Value>, field: &str) -> &'a mut Vec<Value> {
    blob.entry(field)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .expect("field holds a sorted-array-set")
}

fn map_field<'a>(blob: &'a mut Map<String, Value>, field: &str) -> &'a mut Map<String, Value> {
    blob.entry(field)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .expect("field holds a map-backed set")
}

async fn load_blob(batch: &mut Batch<'_>, key: &str) -> Result<Map<String, Value>, Error> {
    match batch.get_json(key).await? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Inserts `element` into the sorted array at `blob[field]`, keeping it
/// sorted by [`sort_key`]. No-op if an element with the same key is already
/// present.
pub async fn add_to_sorted_set(batch: &mut Batch<'_>, key: &str, field: &str, element: Value) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    let array = array_field(&mut blob, field);
    let needle = sort_key(&element).to_string();
    match array.binary_search_by(|existing| sort_key(existing).cmp(needle.as_str())) {
        Ok(_) => {}
        Err(pos) => array.insert(pos, element),
    }
    batch.set_json(key, &Value::Object(blob))
}

/// Removes the element matching `element_key` from the sorted array at
/// `blob[field]`. No-op if absent.
pub async fn del_from_sorted_set(batch: &mut Batch<'_>, key: &str, field: &str, element_key: &str) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    let array = array_field(&mut blob, field);
    if let Ok(pos) = array.binary_search_by(|existing| sort_key(existing).cmp(element_key)) {
        array.remove(pos);
    }
    batch.set_json(key, &Value::Object(blob))
}

/// Merges `elements` (need not be pre-sorted) into the sorted array at
/// `blob[field]`, deduplicating by [`sort_key`] — the lexicographic union.
pub async fn set_union(batch: &mut Batch<'_>, key: &str, field: &str, mut elements: Vec<Value>) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    elements.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));
    let existing = std::mem::take(array_field(&mut blob, field));
    let merged = merge_union(existing, elements);
    *array_field(&mut blob, field) = merged;
    batch.set_json(key, &Value::Object(blob))
}

/// Removes every element of `elements` (by [`sort_key`]) from the sorted
/// array at `blob[field]` — the set difference.
pub async fn set_difference(batch: &mut Batch<'_>, key: &str, field: &str, elements: &[Value]) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    let remove: std::collections::BTreeSet<&str> = elements.iter().map(sort_key).collect();
    let existing = std::mem::take(array_field(&mut blob, field));
    let kept = existing.into_iter().filter(|e| !remove.contains(sort_key(e))).collect();
    *array_field(&mut blob, field) = kept;
    batch.set_json(key, &Value::Object(blob))
}

fn merge_union(existing: Vec<Value>, incoming: Vec<Value>) -> Vec<Value> {
    let mut result = Vec::with_capacity(existing.len() + incoming.len());
    let mut left = existing.into_iter().peekable();
    let mut right = incoming.into_iter().peekable();
    loop {
        match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => match sort_key(l).cmp(sort_key(r)) {
                std::cmp::Ordering::Less => result.push(left.next().unwrap()),
                std::cmp::Ordering::Greater => result.push(right.next().unwrap()),
                std::cmp::Ordering::Equal => {
                    result.push(left.next().unwrap());
                    right.next();
                }
            },
            (Some(_), None) => result.push(left.next().unwrap()),
            (None, Some(_)) => result.push(right.next().unwrap()),
            (None, None) => break,
        }
    }
    result
}

/// Queues a `SADD` against the KV store's native set type at `group_key`.
pub fn add_to_redis_set(batch: &mut Batch<'_>, group_key: &str, member: &str) {
    batch.sadd(group_key, member);
}

/// Queues a `SREM` against the KV store's native set type at `group_key`.
pub fn del_from_redis_set(batch: &mut Batch<'_>, group_key: &str, member: &str) {
    batch.srem(group_key, member);
}

/// Sets `blob[field][element] = true` — the map-backed legacy set shape.
pub async fn add_to_map(batch: &mut Batch<'_>, key: &str, field: &str, element: &str) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    map_field(&mut blob, field).insert(element.to_string(), Value::Bool(true));
    batch.set_json(key, &Value::Object(blob))
}

/// Removes `blob[field][element]`.
pub async fn del_from_map(batch: &mut Batch<'_>, key: &str, field: &str, element: &str) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    map_field(&mut blob, field).remove(element);
    batch.set_json(key, &Value::Object(blob))
}

/// Sets `blob[property] = value`.
pub async fn set_value(batch: &mut Batch<'_>, key: &str, property: &str, value: Value) -> Result<(), Error> {
    let mut blob = load_blob(batch, key).await?;
    blob.insert(property.to_string(), value);
    batch.set_json(key, &Value::Object(blob))
}

/// Rewrites the secondary index `/{entity_type}/{account}/{name}` after a
/// rename, and updates `blob.name`. If the primary blob is missing, logs a
/// warning and does nothing else (§4.2).
pub async fn rename(batch: &mut Batch<'_>, primary_key: &str, entity_type: &str, new_name: &str) -> Result<(), Error> {
    let blob = batch.get_json(primary_key).await?;
    let Value::Object(mut map) = blob else {
        tracing::warn!(key = primary_key, "rename: primary entity missing, skipping");
        return Ok(());
    };
    if map.is_empty() {
        tracing::warn!(key = primary_key, "rename: primary entity missing, skipping");
        return Ok(());
    }
    let account = map.get("account").and_then(Value::as_str).unwrap_or("").to_string();
    let old_name = map.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    let uuid = map.get("uuid").and_then(Value::as_str).unwrap_or("").to_string();

    batch.del(&format!("/{entity_type}/{account}/{old_name}"));
    batch.set(&format!("/{entity_type}/{account}/{new_name}"), uuid);
    map.insert("name".to_string(), Value::String(new_name.to_string()));
    batch.set_json(primary_key, &Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvClient;

    fn rule(raw: &str) -> Value {
        serde_json::json!([raw, {}])
    }

    #[tokio::test]
    async fn add_to_sorted_set_keeps_order_and_is_idempotent() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add_to_sorted_set(&mut batch, "/uuidv2/p1", "policies", Value::String("c".into())).await.unwrap();
        add_to_sorted_set(&mut batch, "/uuidv2/p1", "policies", Value::String("a".into())).await.unwrap();
        add_to_sorted_set(&mut batch, "/uuidv2/p1", "policies", Value::String("b".into())).await.unwrap();
        add_to_sorted_set(&mut batch, "/uuidv2/p1", "policies", Value::String("b".into())).await.unwrap();
        let blob = batch.get_json("/uuidv2/p1").await.unwrap();
        let arr = blob["policies"].as_array().unwrap();
        let values: Vec<&str> = arr.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn del_from_sorted_set_is_noop_when_absent() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        del_from_sorted_set(&mut batch, "/uuidv2/p1", "policies", "missing").await.unwrap();
        let blob = batch.get_json("/uuidv2/p1").await.unwrap();
        assert_eq!(blob["policies"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn set_union_dedupes_by_raw() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add_to_sorted_set(&mut batch, "/uuidv2/pol1", "rules", rule("z")).await.unwrap();
        set_union(&mut batch, "/uuidv2/pol1", "rules", vec![rule("a"), rule("z")]).await.unwrap();
        let blob = batch.get_json("/uuidv2/pol1").await.unwrap();
        let raws: Vec<&str> = blob["rules"].as_array().unwrap().iter().map(|r| r[0].as_str().unwrap()).collect();
        assert_eq!(raws, vec!["a", "z"]);
    }

    #[tokio::test]
    async fn set_difference_removes_matching_elements() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        set_union(
            &mut batch,
            "/uuidv2/pol1",
            "rules",
            vec![rule("a"), rule("b"), rule("c")],
        )
        .await
        .unwrap();
        set_difference(&mut batch, "/uuidv2/pol1", "rules", &[rule("b")]).await.unwrap();
        let blob = batch.get_json("/uuidv2/pol1").await.unwrap();
        let raws: Vec<&str> = blob["rules"].as_array().unwrap().iter().map(|r| r[0].as_str().unwrap()).collect();
        assert_eq!(raws, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn add_and_del_from_map() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        add_to_map(&mut batch, "/uuid/u1", "groups", "admins").await.unwrap();
        let blob = batch.get_json("/uuid/u1").await.unwrap();
        assert_eq!(blob["groups"]["admins"], Value::Bool(true));
        del_from_map(&mut batch, "/uuid/u1", "groups", "admins").await.unwrap();
        let blob = batch.get_json("/uuid/u1").await.unwrap();
        assert!(blob["groups"].as_object().unwrap().get("admins").is_none());
    }

    #[tokio::test]
    async fn rename_rewrites_secondary_index_and_name() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        set_value(&mut batch, "/uuidv2/role1", "uuid", Value::String("role1".into())).await.unwrap();
        set_value(&mut batch, "/uuidv2/role1", "account", Value::String("acct1".into())).await.unwrap();
        set_value(&mut batch, "/uuidv2/role1", "name", Value::String("old-name".into())).await.unwrap();
        rename(&mut batch, "/uuidv2/role1", "role", "new-name").await.unwrap();
        let blob = batch.get_json("/uuidv2/role1").await.unwrap();
        assert_eq!(blob["name"], Value::String("new-name".into()));
        assert_eq!(batch.get("/role/acct1/old-name").await.unwrap(), None);
        assert_eq!(batch.get("/role/acct1/new-name").await.unwrap(), Some("role1".to_string()));
    }

    #[tokio::test]
    async fn rename_on_missing_entity_is_noop() {
        let client = InMemoryKvClient::new();
        let mut batch = Batch::new(&client);
        rename(&mut batch, "/uuidv2/ghost", "role", "new-name").await.unwrap();
        assert_eq!(batch.pending(), 0);
    }
}
