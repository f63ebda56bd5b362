//! 请求组装层：把扁平参数转换为路径、查询、请求体与文件部件。
//!
//! # Request Assembly
//!
//! Pure functions that turn an [`OperationSpec`](crate::protocol::OperationSpec)
//! and the caller's [`Arguments`](crate::types::Arguments) into the pieces of
//! an HTTP request. Nothing here performs I/O except [`files::prepare_parts`],
//! which opens upload handles and registers them for cleanup.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`path`] | `{name}` substitution with form-style escaping |
//! | [`query`] | Query map assembly and pair flattening |
//! | [`body`] | Deep path assignment and deep compaction |
//! | [`files`] | File mapping resolution and multipart preparation |

pub mod body;
pub mod files;
pub mod path;
pub mod query;

pub use body::{assign_path, build_body, deep_compact};
pub use files::{build_files, prepare_parts, ResolvedFile};
pub use path::{build_path, encode_path_segment};
pub use query::{build_query, flatten_pairs};

use crate::types::RequestOptions;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A fully resolved call, ready for the transport adapter.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub method: String,
    /// Path relative to the base URL, placeholders already substituted.
    pub path: String,
    pub query: Map<String, Value>,
    pub json: Option<Value>,
    pub form: Option<Value>,
    pub files: Vec<ResolvedFile>,
    pub headers: BTreeMap<String, String>,
    pub request_options: RequestOptions,
    pub force_multipart: bool,
}

impl CallRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_form(mut self, form: Value) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, file: ResolvedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.request_options = options;
        self
    }

    pub fn force_multipart(mut self, force: bool) -> Self {
        self.force_multipart = force;
        self
    }

    /// True when the request is sent as `multipart/form-data`.
    pub fn is_multipart(&self) -> bool {
        self.force_multipart || !self.files.is_empty()
    }
}
