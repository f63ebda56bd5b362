//! Operation spec structure
//!
//! An [`OperationSpec`] is the immutable, declarative description of one API
//! call. Specs are parsed once from the spec tree and shared read-only across
//! concurrent calls.

use crate::types::Arg;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared default that leaves an argument omitted.
pub const OMIT_DEFAULT: &str = "__OMIT__";

/// One API operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default)]
    pub positional_params: Vec<ParamDecl>,
    #[serde(default)]
    pub keyword_params: Vec<ParamDecl>,
    pub request: RequestSpec,
}

/// A declared parameter of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// The argument an unsupplied parameter takes, if the declaration has a
    /// literal default.
    pub fn default_arg(&self) -> Option<Arg> {
        match &self.default {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s == OMIT_DEFAULT => None,
            Some(v) => Some(Arg::from(v.clone())),
        }
    }

    pub fn has_default(&self) -> bool {
        !matches!(self.default, None | Some(Value::Null))
    }
}

/// Request shape of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub path: PathSpec,
    #[serde(default)]
    pub query: Vec<QueryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<BodySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<BodySpec>,
    #[serde(default)]
    pub files: Vec<FileMapping>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub force_multipart: bool,
}

/// URL template with `{name}` placeholders and the names it requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSpec {
    pub template: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// Query parameter mapping: read from an argument, or a constant literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Value>,
}

impl QueryEntry {
    pub fn param(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: Some(param.into()),
            literal: None,
        }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            param: None,
            literal: Some(value.into()),
        }
    }
}

/// JSON or form body: an optional literal seed plus deep path assignments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodySpec {
    #[serde(default)]
    pub literal: Option<Value>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl BodySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_literal(mut self, literal: Value) -> Self {
        self.literal = Some(literal);
        self
    }

    pub fn assign(mut self, param: impl Into<String>, path: Vec<PathSegment>) -> Self {
        self.assignments.push(Assignment {
            param: param.into(),
            path,
        });
        self
    }

    /// Assign an argument to the top-level key of the same name.
    pub fn field(self, param: impl Into<String>) -> Self {
        let param = param.into();
        let path = vec![PathSegment::Key(param.clone())];
        self.assign(param, path)
    }
}

/// Places one argument's value at a nested location of the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub param: String,
    #[serde(deserialize_with = "deserialize_body_path")]
    pub path: Vec<PathSegment>,
}

/// One step of a body path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, ".{}", k),
        }
    }
}

impl PathSegment {
    /// Parse a dotted/indexed path such as `items[0].name` or `items.0.name`.
    ///
    /// An empty string yields an empty path.
    pub fn parse_path(path: &str) -> crate::Result<Vec<PathSegment>> {
        let normalized = path.trim().trim_start_matches("$.");
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let mut segments = Vec::new();
        for part in normalized.split('.') {
            if part.is_empty() {
                return Err(crate::Error::invalid_path(format!(
                    "empty segment in path '{}'",
                    path
                )));
            }

            // Split "items[0][1]" into the key and its bracketed indices.
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if !key.is_empty() {
                if rest.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
                    let idx = key.parse::<usize>().map_err(|e| {
                        crate::Error::invalid_path(format!("bad index '{}': {}", key, e))
                    })?;
                    segments.push(PathSegment::Index(idx));
                } else {
                    segments.push(PathSegment::Key(key.to_string()));
                }
            }

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| {
                    crate::Error::invalid_path(format!("unclosed '[' in path '{}'", path))
                })?;
                let idx_str = &rest[1..close];
                let idx = idx_str.parse::<usize>().map_err(|_| {
                    crate::Error::invalid_path(format!(
                        "index '{}' in path '{}' is not a non-negative integer",
                        idx_str, path
                    ))
                })?;
                segments.push(PathSegment::Index(idx));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(crate::Error::invalid_path(format!(
                        "unexpected '{}' after index in path '{}'",
                        rest, path
                    )));
                }
            }
        }
        Ok(segments)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBodyPath {
    Segments(Vec<PathSegment>),
    Dotted(String),
}

fn deserialize_body_path<'de, D>(deserializer: D) -> Result<Vec<PathSegment>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawBodyPath::deserialize(deserializer)? {
        RawBodyPath::Segments(segments) => Ok(segments),
        RawBodyPath::Dotted(path) => {
            PathSegment::parse_path(&path).map_err(serde::de::Error::custom)
        }
    }
}

/// Multipart field fed from a [`FileSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMapping {
    pub name: String,
    #[serde(default)]
    pub value: Option<FileSpec>,
}

impl FileMapping {
    pub fn new(name: impl Into<String>, value: FileSpec) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }
}

/// Recursive file mapping algebra.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileSpec {
    /// Take a named argument's value.
    Param { name: String },
    /// Fixed value.
    Literal { value: Value },
    /// Nested spec with filename / content type / header overrides.
    Tuple {
        #[serde(default)]
        content: Option<Box<FileSpec>>,
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        content_type: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    /// Ordered nested specs, each resolved independently.
    List {
        #[serde(default)]
        items: Vec<FileSpec>,
    },
}

impl FileSpec {
    pub fn param(name: impl Into<String>) -> Self {
        FileSpec::Param { name: name.into() }
    }

    pub fn tuple(content: FileSpec) -> Self {
        FileSpec::Tuple {
            content: Some(Box::new(content)),
            filename: None,
            content_type: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let FileSpec::Tuple { filename, .. } = &mut self {
            *filename = Some(name.into());
        }
        self
    }

    pub fn with_content_type(mut self, ct: impl Into<String>) -> Self {
        if let FileSpec::Tuple { content_type, .. } = &mut self {
            *content_type = Some(ct.into());
        }
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let FileSpec::Tuple { headers, .. } = &mut self {
            headers.insert(name.into(), value.into());
        }
        self
    }
}

impl OperationSpec {
    /// Start a spec for `method template`; path placeholders are taken from the template.
    pub fn new(name: impl Into<String>, method: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        let params = super::validator::placeholders(&template);
        Self {
            name: name.into(),
            doc: None,
            positional_params: Vec::new(),
            keyword_params: Vec::new(),
            request: RequestSpec {
                method: method.into(),
                path: PathSpec { template, params },
                query: Vec::new(),
                json: None,
                form: None,
                files: Vec::new(),
                headers: BTreeMap::new(),
                streaming: false,
                force_multipart: false,
            },
        }
    }

    pub fn with_query(mut self, entry: QueryEntry) -> Self {
        self.request.query.push(entry);
        self
    }

    pub fn with_json(mut self, body: BodySpec) -> Self {
        self.request.json = Some(body);
        self
    }

    pub fn with_form(mut self, body: BodySpec) -> Self {
        self.request.form = Some(body);
        self
    }

    pub fn with_file(mut self, mapping: FileMapping) -> Self {
        self.request.files.push(mapping);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_positional_param(mut self, decl: ParamDecl) -> Self {
        self.positional_params.push(decl);
        self
    }

    pub fn with_keyword_param(mut self, decl: ParamDecl) -> Self {
        self.keyword_params.push(decl);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.request.streaming = streaming;
        self
    }

    pub fn force_multipart(mut self, force: bool) -> Self {
        self.request.force_multipart = force;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.request.streaming
    }

    /// All declared parameters, positional first.
    pub fn declared_params(&self) -> impl Iterator<Item = &ParamDecl> {
        self.positional_params.iter().chain(self.keyword_params.iter())
    }
}
