//! Dot-separated JSON path evaluation.
//!
//! A path such as `data.users.*.name` is parsed into [`Segment`]s and
//! evaluated against a [`serde_json::Value`]:
//!
//! - `Key(name)` descends into an object member, or into an array element
//!   when the name is a non-negative integer.
//! - `Wildcard` (`*`) applies the rest of the path to every element of the
//!   current array (or every value of the current object) and collects the
//!   results into an array. Elements where the rest of the path is missing
//!   contribute `null`. When the rest of the path contains another wildcard,
//!   the collected arrays are flattened one level, dropping those `null`s.
//!
//! ```rust
//! use serde_json::json;
//! use trellis_testing::json_path;
//!
//! let doc = json!({"teams": [{"members": ["a", "b"]}, {"members": ["c"]}]});
//! assert_eq!(json_path::get(&doc, "teams.0.members.1"), Some(json!("b")));
//! assert_eq!(json_path::get(&doc, "teams.*.members.*"), Some(json!(["a", "b", "c"])));
//! assert_eq!(json_path::get(&doc, "teams.5"), None);
//! ```

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Wildcard => f.write_str("*"),
        }
    }
}

/// Parse a dot-separated path. The empty path addresses the root.
pub fn parse(path: &str) -> Vec<Segment> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.')
        .map(|segment| match segment {
            "*" => Segment::Wildcard,
            key => Segment::Key(key.to_string()),
        })
        .collect()
}

/// Look up `path` in `value`; `None` when a key along the way is missing.
pub fn get(value: &Value, path: &str) -> Option<Value> {
    evaluate(value, &parse(path))
}

/// Look up `path`, falling back to `default` when it is missing.
pub fn get_or(value: &Value, path: &str, default: Value) -> Value {
    get(value, path).unwrap_or(default)
}

/// Evaluate already-parsed segments.
pub fn evaluate(value: &Value, segments: &[Segment]) -> Option<Value> {
    let mut target = value;
    for (index, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Key(key) => target = child(target, key)?,
            Segment::Wildcard => {
                let rest = &segments[index + 1..];
                let collected: Vec<Value> = elements(target)
                    .map(|item| evaluate(item, rest).unwrap_or(Value::Null))
                    .collect();

                if rest.contains(&Segment::Wildcard) {
                    return Some(Value::Array(flatten_one(collected)));
                }
                return Some(Value::Array(collected));
            }
        }
    }
    Some(target.clone())
}

fn child<'a>(target: &'a Value, key: &str) -> Option<&'a Value> {
    match target {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Values of an array or object; nothing for scalars.
fn elements(target: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match target {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

fn flatten_one(values: Vec<Value>) -> Vec<Value> {
    let mut flat = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Array(items) => flat.extend(items),
            Value::Object(map) => flat.extend(map.into_iter().map(|(_, v)| v)),
            Value::Null => {}
            other => flat.push(other),
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse() {
        assert_eq!(
            parse("data.*.id"),
            vec![
                Segment::Key("data".to_string()),
                Segment::Wildcard,
                Segment::Key("id".to_string())
            ]
        );
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_root_and_keys() {
        let doc = json!({"a": {"b": [10, 20]}});
        assert_eq!(get(&doc, ""), Some(doc.clone()));
        assert_eq!(get(&doc, "a.b.1"), Some(json!(20)));
        assert_eq!(get(&doc, "a.c"), None);
        assert_eq!(get_or(&doc, "a.c", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_wildcard_over_object_values() {
        let doc = json!({"data2": {"x": "a", "y": "b"}});
        assert_eq!(get(&doc, "data2.*"), Some(json!(["a", "b"])));
    }

    #[test]
    fn test_wildcard_missing_members_are_null() {
        let doc = json!({"users": [{"name": "ada"}, {"id": 2}]});
        assert_eq!(get(&doc, "users.*.name"), Some(json!(["ada", null])));
    }

    #[test]
    fn test_nested_wildcards_flatten_one_level() {
        let doc = json!({"groups": [
            {"tags": [["x"], ["y"]]},
            {"tags": [["z"]]}
        ]});
        // Flattened once: the inner arrays survive
        assert_eq!(get(&doc, "groups.*.tags.*"), Some(json!([["x"], ["y"], ["z"]])));
        // Single wildcard: collected as-is
        assert_eq!(get(&doc, "groups.*.tags"), Some(json!([[["x"], ["y"]], [["z"]]])));
    }

    #[test]
    fn test_wildcard_on_scalar_is_empty() {
        assert_eq!(get(&json!({"n": 1}), "n.*"), Some(json!([])));
    }
}
