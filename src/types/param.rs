//! Argument value model for one operation call.

use super::upload::{SharedHandle, UploadSource};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// One argument slot.
///
/// `Omitted` means the caller did not supply the argument at all; `Null` means
/// the caller explicitly passed a null. Both are dropped from query strings and
/// request bodies, but they stay distinct so defaults and required-parameter
/// checks can tell them apart.
#[derive(Debug, Clone, Default)]
pub enum Arg {
    #[default]
    Omitted,
    Null,
    Present(ParamValue),
}

static OMITTED: Arg = Arg::Omitted;

impl Arg {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Arg::Omitted)
    }

    /// True for omitted and null arguments, including a present JSON `null`.
    pub fn is_absent(&self) -> bool {
        self.value().is_none()
    }

    /// The present value, if any.
    pub fn value(&self) -> Option<&ParamValue> {
        match self {
            Arg::Present(ParamValue::Json(Value::Null)) => None,
            Arg::Present(v) => Some(v),
            Arg::Omitted | Arg::Null => None,
        }
    }
}

/// A present argument value.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// Plain data destined for a path, query string or body.
    Json(Value),
    /// Upload helper with ownership metadata.
    Upload(UploadSource),
    /// An already-open stream owned by the caller.
    Stream(SharedHandle),
    /// An in-memory buffer sent as a file part.
    Bytes(Bytes),
    /// Ordered values, sent as repeated multipart fields.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Uploads, streams and byte buffers are sent as files rather than fields.
    pub fn is_file_like(&self) -> bool {
        matches!(
            self,
            ParamValue::Upload(_) | ParamValue::Stream(_) | ParamValue::Bytes(_)
        )
    }

    /// JSON view of the value; `None` when it contains file-like entries.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ParamValue::Json(v) => Some(v.clone()),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            ParamValue::Upload(_) | ParamValue::Stream(_) | ParamValue::Bytes(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ParamValue::Json(_) => "json",
            ParamValue::Upload(_) => "upload",
            ParamValue::Stream(_) => "stream",
            ParamValue::Bytes(_) => "bytes",
            ParamValue::List(_) => "list",
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Arg::Null,
            other => Arg::Present(ParamValue::Json(other)),
        }
    }
}

impl From<ParamValue> for Arg {
    fn from(value: ParamValue) -> Self {
        Arg::Present(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Present(ParamValue::Json(Value::String(value.to_string())))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Present(ParamValue::Json(Value::String(value)))
    }
}

macro_rules! arg_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::from(Value::from(value))
                }
            }
        )*
    };
}

arg_from_scalar!(bool, i32, i64, u32, u64, f64);

impl From<UploadSource> for Arg {
    fn from(value: UploadSource) -> Self {
        Arg::Present(ParamValue::Upload(value))
    }
}

impl From<Vec<UploadSource>> for Arg {
    fn from(value: Vec<UploadSource>) -> Self {
        Arg::Present(ParamValue::List(
            value.into_iter().map(ParamValue::Upload).collect(),
        ))
    }
}

impl From<SharedHandle> for Arg {
    fn from(value: SharedHandle) -> Self {
        Arg::Present(ParamValue::Stream(value))
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Present(ParamValue::Bytes(value))
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Null)
    }
}

/// Ad-hoc per-call overrides, layered on top of what the operation declares.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub additional_headers: BTreeMap<String, String>,
    pub additional_query_parameters: Map<String, Value>,
    pub additional_body_parameters: Map<String, Value>,
    /// Overrides the client-wide timeout for this call.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_query_parameters
            .insert(name.into(), value.into());
        self
    }

    pub fn with_body_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_body_parameters
            .insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Flat argument map for one call.
///
/// Looking up a name that was never set yields [`Arg::Omitted`].
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: HashMap<String, Arg>,
    request_options: RequestOptions,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.request_options = options;
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Arg>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> &Arg {
        self.values.get(name).unwrap_or(&OMITTED)
    }

    /// True when the caller supplied the name, even with a null value.
    pub fn contains(&self, name: &str) -> bool {
        self.values
            .get(name)
            .map(|arg| !arg.is_omitted())
            .unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn request_options(&self) -> &RequestOptions {
        &self.request_options
    }

    pub fn request_options_mut(&mut self) -> &mut RequestOptions {
        &mut self.request_options
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
