// Matchers behind the TestResponse assertions
//
// Each matcher returns `Err(message)` describing the mismatch; TestResponse
// turns that into a test failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Outcome of a matcher: `Err` carries the failure message.
pub type Match = Result<(), String>;

/// Remove markup tags, keeping the text between them.
pub fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// Loose equality.
///
/// Numbers compare by value regardless of representation, numeric strings
/// equal the number they spell, objects ignore key order, and arrays compare
/// element by element.
pub fn loose_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => numbers_eq(a, b),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (s.trim().parse::<f64>(), n.as_f64()) {
                (Ok(parsed), Some(number)) => parsed == number,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        _ => expected == actual,
    }
}

fn numbers_eq(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Strict equality: same JSON types and values; object key order ignored.
pub fn strict_eq(expected: &Value, actual: &Value) -> bool {
    expected == actual
}

/// The part of `actual` whose keys (or indices) also appear in `expected`.
///
/// Returns `None` when the two documents are not the same kind of container.
pub fn intersect_keys(actual: &Value, expected: &Value) -> Option<Value> {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => Some(Value::Object(
            actual
                .iter()
                .filter(|(k, _)| expected.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )),
        (Value::Array(actual), Value::Array(expected)) => Some(Value::Array(
            actual.iter().take(expected.len()).cloned().collect(),
        )),
        _ => None,
    }
}

/// Subset match: every key of `expected` is present in `actual` with an equal
/// value; extra keys in `actual` are ignored.
pub fn json_subset(expected: &Value, actual: &Value, strict: bool) -> Match {
    let subset = intersect_keys(actual, expected).ok_or_else(|| unable_to_find(expected, actual))?;

    let equal = match (&subset, expected) {
        // Compare by key so a different key order in the response is not a mismatch
        (Value::Object(subset), Value::Object(expected)) => {
            subset.len() == expected.len()
                && expected.iter().all(|(k, v)| {
                    subset
                        .get(k)
                        .is_some_and(|s| if strict { strict_eq(v, s) } else { loose_eq(v, s) })
                })
        }
        _ => {
            if strict {
                strict_eq(expected, &subset)
            } else {
                loose_eq(expected, &subset)
            }
        }
    };

    if equal {
        Ok(())
    } else {
        Err(unable_to_find(expected, actual))
    }
}

fn unable_to_find(expected: &Value, actual: &Value) -> String {
    format!(
        "Unable to find JSON:\n\n[{}]\n\nwithin response JSON:\n\n[{}].\n",
        pretty(expected),
        pretty(actual)
    )
}

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Number of elements of an array or members of an object.
pub fn count(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn has_key(data: &Value, key: &str) -> bool {
    match data {
        Value::Object(map) => map.contains_key(key),
        Value::Array(items) => key.parse::<usize>().is_ok_and(|i| i < items.len()),
        _ => false,
    }
}

fn child<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    match data {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Verify that every key named in `template` exists in `data`.
///
/// The template is an array (or object) of entries. A string entry names a
/// required key; an object inside an array template adds its own entries.
/// A nested container under key `k` requires `k` and checks its value
/// against the nested template; under key `*` it checks every element of
/// `data` instead.
pub fn json_structure(template: &Value, data: &Value) -> Match {
    structure_at(template, data, "")
}

fn structure_at(template: &Value, data: &Value, trail: &str) -> Match {
    let entries: Vec<(String, &Value)> = match template {
        // Objects inside an array template contribute their keyed entries
        Value::Array(items) => items
            .iter()
            .enumerate()
            .flat_map(|(i, v)| match v {
                Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect::<Vec<_>>(),
                other => vec![(i.to_string(), other)],
            })
            .collect(),
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        other => vec![(String::new(), other)],
    };

    for (key, value) in entries {
        match value {
            Value::Array(_) | Value::Object(_) if key == "*" => {
                let items: Vec<&Value> = match data {
                    Value::Array(items) => items.iter().collect(),
                    Value::Object(map) => map.values().collect(),
                    other => {
                        return Err(format!(
                            "Expected an array at [{}], found {}.",
                            display_trail(trail),
                            other
                        ));
                    }
                };
                for (index, item) in items.into_iter().enumerate() {
                    structure_at(value, item, &join(trail, &index.to_string()))?;
                }
            }
            Value::Array(_) | Value::Object(_) => {
                let Some(nested) = child(data, &key) else {
                    return Err(missing_key(&key, trail, data));
                };
                structure_at(value, nested, &join(trail, &key))?;
            }
            scalar => {
                let name = match scalar {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !has_key(data, &name) {
                    return Err(missing_key(&name, trail, data));
                }
            }
        }
    }
    Ok(())
}

fn missing_key(key: &str, trail: &str, data: &Value) -> String {
    format!(
        "Failed asserting that the JSON at [{}] has the key [{}]:\n\n{}",
        display_trail(trail),
        key,
        pretty(data)
    )
}

fn join(trail: &str, key: &str) -> String {
    if trail.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", trail, key)
    }
}

fn display_trail(trail: &str) -> &str {
    if trail.is_empty() { "<root>" } else { trail }
}

/// Textual needles searched for by the JSON-missing checks.
///
/// An entry `key => value` is serialised as `{"key":value}` with the braces
/// removed; an array element is serialised on its own. Each needle is then
/// suffixed with `]`, `}` and `,` to anchor it at the end of a member.
pub fn search_strings(key: Option<&str>, value: &Value) -> Vec<String> {
    let needle = match key {
        Some(key) => {
            let mut map = Map::new();
            map.insert(key.to_string(), value.clone());
            let encoded = Value::Object(map).to_string();
            encoded[1..encoded.len() - 1].to_string()
        }
        None => value.to_string(),
    };
    vec![
        format!("{}]", needle),
        format!("{}}}", needle),
        format!("{},", needle),
    ]
}

fn entries(data: &Value) -> Vec<(Option<String>, Value)> {
    match data {
        Value::Object(map) => map.iter().map(|(k, v)| (Some(k.clone()), v.clone())).collect(),
        Value::Array(items) => items.iter().map(|v| (None, v.clone())).collect(),
        other => vec![(None, other.clone())],
    }
}

/// No entry of `data` may appear in `body`.
///
/// This is a textual check on the raw body: reordered keys or a different
/// number formatting hide a fragment from it.
pub fn json_missing(data: &Value, body: &str) -> Match {
    for (key, value) in entries(data) {
        let found = search_strings(key.as_deref(), &value)
            .into_iter()
            .any(|needle| body.contains(&needle));
        if found {
            let fragment = match key {
                Some(key) => Value::Object(Map::from_iter([(key, value)])),
                None => Value::Array(vec![value]),
            };
            return Err(unexpected_fragment(&fragment, body));
        }
    }
    Ok(())
}

/// Passes as soon as one entry of `data` is absent from `body`; fails when
/// every entry is found.
pub fn json_missing_exact(data: &Value, body: &str) -> Match {
    let any_absent = entries(data).into_iter().any(|(key, value)| {
        !search_strings(key.as_deref(), &value)
            .iter()
            .any(|needle| body.contains(needle.as_str()))
    });
    if any_absent {
        Ok(())
    } else {
        Err(unexpected_fragment(data, body))
    }
}

fn unexpected_fragment(fragment: &Value, body: &str) -> String {
    format!(
        "Found unexpected JSON fragment:\n\n[{}]\n\nwithin\n\n[{}].",
        fragment, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("no markup"), "no markup");
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(loose_eq(&json!("1"), &json!(1)));
        assert!(loose_eq(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": "1"})));
        assert!(!loose_eq(&json!([1, 2]), &json!([2, 1])));
        assert!(!loose_eq(&json!("abc"), &json!(0)));
        assert!(!loose_eq(&json!(null), &json!(false)));
    }

    #[test]
    fn test_strict_eq_is_type_aware() {
        assert!(strict_eq(&json!({"a": 1}), &json!({"a": 1})));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_json_subset() {
        let actual = json!({"a": 1, "b": 2});
        assert!(json_subset(&json!({"a": 1}), &actual, true).is_ok());
        assert!(json_subset(&json!({"a": "1"}), &actual, true).is_err());
        assert!(json_subset(&json!({"a": "1"}), &actual, false).is_ok());
        assert!(json_subset(&json!({"c": 3}), &actual, true).is_err());
        assert!(json_subset(&json!([1]), &actual, true).is_err());
    }

    #[test]
    fn test_json_subset_on_arrays() {
        let actual = json!(["x", "y", "z"]);
        assert!(json_subset(&json!(["x", "y"]), &actual, true).is_ok());
        assert!(json_subset(&json!(["y"]), &actual, true).is_err());
    }

    #[test]
    fn test_structure() {
        let data = json!({
            "data": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}],
            "meta": {"total": 2}
        });
        assert!(json_structure(&json!(["data", "meta"]), &data).is_ok());
        let template = json!({"data": {"*": ["id", "name"]}, "meta": ["total"]});
        assert!(json_structure(&template, &data).is_ok());
        assert!(json_structure(&json!(["data", {"meta": ["total"]}]), &data).is_ok());

        let err = json_structure(&json!({"data": {"*": ["email"]}}), &data).unwrap_err();
        assert!(err.contains("[data.0]"));
        assert!(err.contains("[email]"));
    }

    #[test]
    fn test_search_strings() {
        assert_eq!(
            search_strings(Some("id"), &json!(5)),
            vec![r#""id":5]"#, r#""id":5}"#, r#""id":5,"#]
        );
        assert_eq!(search_strings(None, &json!("x"))[0], r#""x"]"#);
    }

    #[test]
    fn test_json_missing() {
        let body = r#"{"id":5,"name":"ada"}"#;
        assert!(json_missing(&json!({"id": 6}), body).is_ok());
        assert!(json_missing(&json!({"id": 5}), body).is_err());
        assert!(json_missing(&json!({"name": "bob", "id": 5}), body).is_err());
    }

    #[test]
    fn test_json_missing_exact() {
        let body = r#"{"id":5,"name":"ada"}"#;
        assert!(json_missing_exact(&json!({"id": 5, "name": "bob"}), body).is_ok());
        assert!(json_missing_exact(&json!({"id": 5, "name": "ada"}), body).is_err());
    }
}
