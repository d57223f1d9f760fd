//! Normalized cache storage
//!
//! Every entity is a map of field keys to values; values are either scalars
//! or links to other entities, so one post is stored once no matter how many
//! pages reference it.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::keys;

/// A cached field value
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Scalar(Value),
    Link(String),
    Links(Vec<String>),
}

/// One cached field invocation under an entity
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub field_key: String,
    pub field_name: String,
    pub arguments: Map<String, Value>,
}

impl FieldInfo {
    pub fn new(field_name: &str, arguments: Map<String, Value>) -> Self {
        Self {
            field_key: keys::field_key(field_name, &arguments),
            field_name: field_name.to_string(),
            arguments,
        }
    }

    /// A field without arguments
    pub fn plain(field_name: &str) -> Self {
        Self::new(field_name, Map::new())
    }
}

/// Storage operations the reconciler is written against
pub trait CacheStore: Send {
    /// Every field invocation cached under `entity_key`
    fn inspect_fields(&self, entity_key: &str) -> Vec<FieldInfo>;

    fn resolve(&self, entity_key: &str, field_key: &str) -> Option<&CacheValue>;

    fn write(&mut self, entity_key: &str, field: FieldInfo, value: CacheValue);

    /// Drop one field. Returns whether it was present.
    fn invalidate(&mut self, entity_key: &str, field_key: &str) -> bool;
}

#[derive(Debug, Clone)]
struct CachedField {
    info: FieldInfo,
    value: CacheValue,
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: HashMap<String, BTreeMap<String, CachedField>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl CacheStore for MemoryStore {
    fn inspect_fields(&self, entity_key: &str) -> Vec<FieldInfo> {
        self.entities
            .get(entity_key)
            .map(|fields| fields.values().map(|f| f.info.clone()).collect())
            .unwrap_or_default()
    }

    fn resolve(&self, entity_key: &str, field_key: &str) -> Option<&CacheValue> {
        self.entities
            .get(entity_key)
            .and_then(|fields| fields.get(field_key))
            .map(|f| &f.value)
    }

    fn write(&mut self, entity_key: &str, field: FieldInfo, value: CacheValue) {
        self.entities
            .entry(entity_key.to_string())
            .or_default()
            .insert(field.field_key.clone(), CachedField { info: field, value });
    }

    fn invalidate(&mut self, entity_key: &str, field_key: &str) -> bool {
        let Some(fields) = self.entities.get_mut(entity_key) else {
            return false;
        };
        let removed = fields.remove(field_key).is_some();
        if fields.is_empty() {
            self.entities.remove(entity_key);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_then_inspect_and_resolve() {
        let mut store = MemoryStore::new();
        let args = json!({ "limit": 10, "cursor": null })
            .as_object()
            .cloned()
            .unwrap();
        let field = FieldInfo::new("posts", args.clone());
        let key = field.field_key.clone();

        store.write(keys::ROOT_KEY, field, CacheValue::Link("Query.x".into()));

        let fields = store.inspect_fields(keys::ROOT_KEY);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name, "posts");
        assert_eq!(fields[0].arguments, args);
        assert_eq!(
            store.resolve(keys::ROOT_KEY, &key),
            Some(&CacheValue::Link("Query.x".into()))
        );
    }

    #[test]
    fn test_invalidate_removes_field() {
        let mut store = MemoryStore::new();
        store.write("Post:1", FieldInfo::plain("points"), CacheValue::Scalar(json!(3)));

        assert!(store.invalidate("Post:1", "points"));
        assert!(!store.invalidate("Post:1", "points"));
        assert_eq!(store.resolve("Post:1", "points"), None);
        assert!(store.inspect_fields("Post:1").is_empty());
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn test_unknown_entity_has_no_fields() {
        let store = MemoryStore::new();
        assert!(store.inspect_fields("Query").is_empty());
        assert_eq!(store.resolve("Query", "me"), None);
    }
}
