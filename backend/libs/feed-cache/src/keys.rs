//! Cache key schema
//!
//! Entities: `{Typename}:{id}`, the root query entity is `Query`.
//! Fields: `{name}` or `{name}({arguments as JSON, keys sorted})`.
//! Embedded (non-keyable) objects: `{parent_key}.{field_key}`.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub const ROOT_KEY: &str = "Query";

pub fn entity_key(typename: &str, id: impl Display) -> String {
    format!("{}:{}", typename, id)
}

pub fn post_key(post_id: i32) -> String {
    entity_key("Post", post_id)
}

pub fn user_key(user_id: i32) -> String {
    entity_key("User", user_id)
}

pub fn field_key(field_name: &str, arguments: &Map<String, Value>) -> String {
    if arguments.is_empty() {
        return field_name.to_string();
    }
    format!("{}({})", field_name, stringify_arguments(arguments))
}

pub fn embedded_key(parent_key: &str, field_key: &str) -> String {
    format!("{}.{}", parent_key, field_key)
}

/// Compact JSON with object keys sorted at every level
fn stringify_arguments(arguments: &Map<String, Value>) -> String {
    let sorted: BTreeMap<&String, SortedValue<'_>> =
        arguments.iter().map(|(k, v)| (k, SortedValue(v))).collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

struct SortedValue<'a>(&'a Value);

impl Serialize for SortedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, &Value> = map.iter().collect();
                let mut out = serializer.serialize_map(Some(sorted.len()))?;
                for (k, v) in sorted {
                    out.serialize_entry(k, &SortedValue(v))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&SortedValue(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_field_key_sorts_arguments() {
        let key = field_key("posts", &args(json!({ "limit": 10, "cursor": null })));
        assert_eq!(key, r#"posts({"cursor":null,"limit":10})"#);
    }

    #[test]
    fn test_field_key_without_arguments() {
        assert_eq!(field_key("me", &Map::new()), "me");
    }

    #[test]
    fn test_nested_arguments_sorted() {
        let key = field_key("search", &args(json!({ "filter": { "b": 1, "a": [ { "z": 0, "y": 1 } ] } })));
        assert_eq!(key, r#"search({"filter":{"a":[{"y":1,"z":0}],"b":1}})"#);
    }

    #[test]
    fn test_entity_keys() {
        assert_eq!(post_key(10), "Post:10");
        assert_eq!(user_key(3), "User:3");
        assert_eq!(
            embedded_key(ROOT_KEY, r#"posts({"cursor":null,"limit":10})"#),
            r#"Query.posts({"cursor":null,"limit":10})"#
        );
    }
}
