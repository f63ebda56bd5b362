//! File mapping resolution and multipart part preparation.

use crate::client::CleanupGuard;
use crate::protocol::{FileMapping, FileSpec};
use crate::request::query::scalar_text;
use crate::transport::MultipartField;
use crate::types::{Arg, Arguments, FileOpener, ParamValue, DEFAULT_CONTENT_TYPE};
use crate::Result;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

const JSON_CONTENT_TYPE: &str = "application/json";

/// A file mapping with its argument value resolved.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub name: String,
    pub value: ParamValue,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
}

struct Resolved {
    value: ParamValue,
    filename: Option<String>,
    content_type: Option<String>,
    headers: BTreeMap<String, String>,
}

impl Resolved {
    fn plain(value: ParamValue) -> Self {
        Self {
            value,
            filename: None,
            content_type: None,
            headers: BTreeMap::new(),
        }
    }
}

/// Resolve every file mapping; mappings whose value is absent contribute nothing.
pub fn build_files(mappings: &[FileMapping], args: &Arguments) -> Vec<ResolvedFile> {
    mappings
        .iter()
        .filter_map(|mapping| {
            let resolved = resolve_entry(mapping.value.as_ref()?, args)?;
            Some(ResolvedFile {
                name: mapping.name.clone(),
                value: resolved.value,
                filename: resolved.filename,
                content_type: resolved.content_type,
                headers: resolved.headers,
            })
        })
        .collect()
}

fn resolve_entry(spec: &FileSpec, args: &Arguments) -> Option<Resolved> {
    match spec {
        FileSpec::Param { name } => args.get(name).value().cloned().map(Resolved::plain),
        FileSpec::Literal { value } => Arg::from(value.clone())
            .value()
            .cloned()
            .map(Resolved::plain),
        FileSpec::Tuple {
            content,
            filename,
            content_type,
            headers,
        } => {
            let inner = resolve_entry(content.as_deref()?, args)?;
            let mut merged = inner.headers;
            merged.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(Resolved {
                value: inner.value,
                filename: filename.clone().or(inner.filename),
                content_type: content_type.clone().or(inner.content_type),
                headers: merged,
            })
        }
        FileSpec::List { items } => {
            let values: Vec<ParamValue> = items
                .iter()
                .filter_map(|item| resolve_entry(item, args).map(|r| r.value))
                .collect();
            (!values.is_empty()).then(|| Resolved::plain(ParamValue::List(values)))
        }
    }
}

/// Build the multipart payload: form fields first, then file entries.
///
/// File entries replace form fields of the same name, and a later file entry
/// replaces an earlier one. Every handle opened here, and every upload marked
/// `auto_close`, is registered with `guard`.
pub fn prepare_parts(
    files: &[ResolvedFile],
    form: Option<&Value>,
    opener: &dyn FileOpener,
    guard: &mut CleanupGuard,
) -> Result<Vec<MultipartField>> {
    let mut file_groups: Vec<(String, Vec<MultipartField>)> = Vec::new();
    for entry in files {
        let mut fields = Vec::new();
        match &entry.value {
            ParamValue::List(items) => {
                for item in items {
                    push_leaf(&mut fields, entry, item, opener, guard)?;
                }
            }
            ParamValue::Json(Value::Array(items)) => {
                for item in items {
                    push_leaf(&mut fields, entry, &ParamValue::Json(item.clone()), opener, guard)?;
                }
            }
            single => push_leaf(&mut fields, entry, single, opener, guard)?,
        }
        match file_groups.iter_mut().find(|(name, _)| *name == entry.name) {
            Some(group) => group.1 = fields,
            None => file_groups.push((entry.name.clone(), fields)),
        }
    }

    let mut parts = Vec::new();
    if let Some(Value::Object(form)) = form {
        for (name, value) in form {
            if file_groups.iter().any(|(file_name, _)| file_name == name) {
                continue;
            }
            push_text_fields(&mut parts, name, value);
        }
    }
    parts.extend(file_groups.into_iter().flat_map(|(_, fields)| fields));
    Ok(parts)
}

fn push_text_fields(parts: &mut Vec<MultipartField>, name: &str, value: &Value) {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        single => std::slice::from_ref(single),
    };
    for item in items {
        if let Some(text) = scalar_text(item) {
            parts.push(MultipartField::text(name, text));
        }
    }
}

fn push_leaf(
    fields: &mut Vec<MultipartField>,
    entry: &ResolvedFile,
    value: &ParamValue,
    opener: &dyn FileOpener,
    guard: &mut CleanupGuard,
) -> Result<()> {
    let content_type = entry.content_type.as_deref();
    let name = entry.name.as_str();

    let encoded;
    let value = match (content_type, value) {
        (Some(JSON_CONTENT_TYPE), ParamValue::Json(v)) if !v.is_string() => {
            encoded = ParamValue::Json(Value::String(serde_json::to_string(v)?));
            &encoded
        }
        _ => value,
    };

    if let (Some(ct), ParamValue::Json(v)) = (content_type, value) {
        if let Some(text) = scalar_text(v) {
            fields.push(MultipartField::Text {
                name: name.to_string(),
                value: text,
                content_type: Some(ct.to_string()),
                headers: entry.headers.clone(),
            });
        }
        return Ok(());
    }

    match value {
        ParamValue::Upload(upload) => {
            let handle = upload.open(opener)?;
            if upload.auto_close() {
                guard.defer_close(handle.clone());
            }
            let data = handle.read_to_end()?;
            let filename = upload
                .filename()
                .map(str::to_string)
                .or_else(|| entry.filename.clone());
            fields.push(MultipartField::File {
                name: name.to_string(),
                data: Bytes::from(data),
                filename,
                content_type: upload.content_type().to_string(),
                headers: entry.headers.clone(),
            });
        }
        ParamValue::Stream(handle) => {
            let data = handle.read_to_end()?;
            fields.push(file_field(entry, Bytes::from(data), entry.filename.clone()));
        }
        ParamValue::Bytes(bytes) => {
            fields.push(file_field(entry, bytes.clone(), entry.filename.clone()));
        }
        ParamValue::Json(Value::String(s)) if opener.exists(Path::new(s)) => {
            let path = Path::new(s);
            let handle = opener.open(path)?;
            guard.defer_close(handle.clone());
            let data = handle.read_to_end()?;
            let filename = entry.filename.clone().or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });
            fields.push(file_field(entry, Bytes::from(data), filename));
        }
        ParamValue::Json(v) => {
            if let Some(text) = scalar_text(v) {
                fields.push(MultipartField::Text {
                    name: name.to_string(),
                    value: text,
                    content_type: None,
                    headers: entry.headers.clone(),
                });
            }
        }
        ParamValue::List(items) => {
            for item in items {
                push_leaf(fields, entry, item, opener, guard)?;
            }
        }
    }
    Ok(())
}

fn file_field(entry: &ResolvedFile, data: Bytes, filename: Option<String>) -> MultipartField {
    MultipartField::File {
        name: entry.name.clone(),
        data,
        filename,
        content_type: entry
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        headers: entry.headers.clone(),
    }
}
