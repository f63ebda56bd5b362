//! Request body assembly: deep path assignment followed by deep compaction.

use crate::protocol::{BodySpec, PathSegment};
use crate::types::{Arg, Arguments, RequestOptions};
use crate::{Error, ErrorContext, Result};
use serde_json::{Map, Value};

/// Build a JSON or form body from its spec.
///
/// Returns `None` when there is no spec, or when nothing is left after
/// compaction and the request options add no parameters.
pub fn build_body(
    spec: Option<&BodySpec>,
    args: &Arguments,
    options: &RequestOptions,
) -> Result<Option<Value>> {
    let Some(spec) = spec else {
        return Ok(None);
    };

    let mut body = spec.literal.clone().unwrap_or(Value::Null);
    if !spec.assignments.is_empty() {
        if body.is_null() {
            body = Value::Object(Map::new());
        }
        for assignment in &spec.assignments {
            let value = body_value(&assignment.param, args.get(&assignment.param))?;
            assign_path(&mut body, &assignment.path, value)?;
        }
    }

    let body = deep_compact(body);
    if options.additional_body_parameters.is_empty() {
        return Ok(body);
    }

    let mut merged = match body {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::validation_with_context(
                "additional body parameters require an object body",
                ErrorContext::new().with_source("body_assembler"),
            ))
        }
    };
    for (name, value) in &options.additional_body_parameters {
        merged.insert(name.clone(), value.clone());
    }
    Ok(Some(Value::Object(merged)))
}

/// Absent arguments become nulls, which compaction removes.
fn body_value(param: &str, arg: &Arg) -> Result<Value> {
    match arg.value() {
        None => Ok(Value::Null),
        Some(v) => v.to_json().ok_or_else(|| {
            Error::validation_with_context(
                format!("a {} value cannot be placed in a request body", v.kind()),
                ErrorContext::new()
                    .with_field_path(param)
                    .with_source("body_assembler"),
            )
        }),
    }
}

/// Place `value` at `path` inside `container`, creating intermediate containers.
///
/// Keys create objects, indices create arrays padded with nulls. The kind of
/// a new intermediate container follows the type of the next segment.
pub fn assign_path(container: &mut Value, path: &[PathSegment], value: Value) -> Result<()> {
    let Some((head, tail)) = path.split_first() else {
        return Err(Error::invalid_path("path cannot be empty"));
    };

    if container.is_null() {
        *container = match head {
            PathSegment::Index(_) => Value::Array(Vec::new()),
            PathSegment::Key(_) => Value::Object(Map::new()),
        };
    }

    let slot = match (head, container) {
        (PathSegment::Index(idx), Value::Array(items)) => {
            if items.len() <= *idx {
                items.resize(idx + 1, Value::Null);
            }
            &mut items[*idx]
        }
        (PathSegment::Key(key), Value::Object(map)) => {
            map.entry(key.clone()).or_insert(Value::Null)
        }
        (segment, existing) => {
            return Err(Error::invalid_path(format!(
                "cannot address '{}' inside {}",
                segment,
                kind_name(existing)
            )))
        }
    };

    if tail.is_empty() {
        *slot = value;
        Ok(())
    } else {
        assign_path(slot, tail, value)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Drop null entries recursively; containers left empty disappear too.
///
/// Array entries are re-indexed after removal.
pub fn deep_compact(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let compacted: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| deep_compact(v).map(|v| (k, v)))
                .collect();
            (!compacted.is_empty()).then_some(Value::Object(compacted))
        }
        Value::Array(items) => {
            let compacted: Vec<Value> = items.into_iter().filter_map(deep_compact).collect();
            (!compacted.is_empty()).then_some(Value::Array(compacted))
        }
        other => Some(other),
    }
}
