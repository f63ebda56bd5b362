//! Query string assembly.

use crate::protocol::QueryEntry;
use crate::types::{Arguments, RequestOptions};
use crate::{Error, ErrorContext, Result};
use serde_json::{Map, Value};

/// Resolve query entries, then layer request-option parameters on top.
///
/// Omitted and null values never reach the output.
pub fn build_query(
    entries: &[QueryEntry],
    args: &Arguments,
    options: &RequestOptions,
) -> Result<Map<String, Value>> {
    let mut query = Map::new();
    for entry in entries {
        let value = match (&entry.param, &entry.literal) {
            (Some(param), _) => match args.get(param).value() {
                Some(v) => v.to_json().ok_or_else(|| {
                    Error::validation_with_context(
                        format!("a {} value cannot be sent as a query parameter", v.kind()),
                        ErrorContext::new()
                            .with_field_path(param.as_str())
                            .with_source("query_assembler"),
                    )
                })?,
                None => continue,
            },
            (None, Some(literal)) => literal.clone(),
            (None, None) => continue,
        };
        if value.is_null() {
            continue;
        }
        query.insert(entry.name.clone(), value);
    }

    for (name, value) in &options.additional_query_parameters {
        query.insert(name.clone(), value.clone());
    }
    query.retain(|_, v| !v.is_null());
    Ok(query)
}

/// Flatten a value map into `(name, text)` pairs for URL or form encoding.
///
/// Arrays become repeated keys; objects are sent as compact JSON.
pub fn flatten_pairs(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in map {
        push_pairs(name, value, &mut pairs);
    }
    pairs
}

fn push_pairs(name: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                if let Some(text) = scalar_text(item) {
                    pairs.push((name.to_string(), text));
                }
            }
        }
        other => {
            if let Some(text) = scalar_text(other) {
                pairs.push((name.to_string(), text));
            }
        }
    }
}

/// Text form of a single value: strings verbatim, nested structures as JSON.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries() -> Vec<QueryEntry> {
        vec![
            QueryEntry::param("page_size", "page_size"),
            QueryEntry::param("voice_id", "voice_id"),
        ]
    }

    #[test]
    fn history_list_query() {
        let args = Arguments::new().with("page_size", 5).with("voice_id", json!(null));
        let query = build_query(&entries(), &args, &RequestOptions::default()).unwrap();
        assert_eq!(Value::Object(query), json!({"page_size": 5}));
    }

    #[test]
    fn literals_and_overrides() {
        let mut entries = entries();
        entries.push(QueryEntry::literal("format", "mp3"));
        let args = Arguments::new().with("page_size", 5);
        let options = RequestOptions::new()
            .with_query_parameter("page_size", 10)
            .with_query_parameter("extra", "x")
            .with_query_parameter("format", Value::Null);
        let query = build_query(&entries, &args, &options).unwrap();
        assert_eq!(Value::Object(query), json!({"page_size": 10, "extra": "x"}));
    }

    #[test]
    fn keeps_zero_and_empty_string() {
        let args = Arguments::new().with("page_size", 0).with("voice_id", "");
        let query = build_query(&entries(), &args, &RequestOptions::default()).unwrap();
        assert_eq!(Value::Object(query), json!({"page_size": 0, "voice_id": ""}));
    }

    #[test]
    fn flattens_arrays_and_objects() {
        let map = json!({"ids": ["a", 1], "meta": {"k": "v"}, "on": true})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            flatten_pairs(&map),
            vec![
                ("ids".to_string(), "a".to_string()),
                ("ids".to_string(), "1".to_string()),
                ("meta".to_string(), r#"{"k":"v"}"#.to_string()),
                ("on".to_string(), "true".to_string()),
            ]
        );
    }
}
