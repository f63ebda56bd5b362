//! 类型系统模块：调用参数、上传源与响应体的值模型。
//!
//! # Types Module
//!
//! This module defines the value model that flows through the request pipeline:
//! the arguments a caller supplies for one operation call, the upload sources
//! destined for multipart payloads, and the decoded response body.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Arg`] | Tri-state argument slot: omitted, explicit null, or present |
//! | [`ParamValue`] | A present argument value (JSON, upload, stream, bytes, list) |
//! | [`Arguments`] | Flat argument map plus the reserved [`RequestOptions`] slot |
//! | [`UploadSource`] | Path, stream or byte buffer wrapper with filename, content type and `auto_close` |
//! | [`SharedHandle`] | Shared, idempotently closable file handle |
//! | [`FileOpener`] | Pluggable strategy for opening path-backed uploads |
//! | [`ResponseBody`] | JSON, raw bytes, or empty |

pub mod param;
pub mod response;
pub mod upload;

pub use param::{Arg, Arguments, ParamValue, RequestOptions};
pub use response::ResponseBody;
pub use upload::{
    FileHandle, FileOpener, FsFile, FsOpener, MemoryFile, SharedHandle, UploadBacking,
    UploadSource, DEFAULT_CONTENT_TYPE,
};
