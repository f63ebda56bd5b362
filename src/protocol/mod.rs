//! 操作规范层：负责加载、验证和索引 API 操作描述。
//!
//! # Operation Specification Layer
//!
//! Every API call is described declaratively by an [`OperationSpec`]: HTTP
//! method, path template, query / body / file mappings and a streaming flag.
//! Specs are grouped into a resource tree, loaded once, validated and indexed
//! by dotted identifiers such as `voices.pvc.samples.create`.
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`operation`] | Operation spec data model and file mapping algebra |
//! | [`loader`] | Spec tree loading from JSON, YAML and the embedded asset |
//! | [`validator`] | Structural checks run before registration |
//! | [`registry`] | Flattened, read-only operation index |
//! | [`error`] | Protocol-specific error types |
//!
//! ## Example
//!
//! ```rust,no_run
//! use elevenlabs_rust::protocol::{OperationRegistry, SpecLoader};
//!
//! #[tokio::main]
//! async fn main() -> elevenlabs_rust::Result<()> {
//!     let tree = SpecLoader::new().load_from_file("spec/elevenlabs.json").await?;
//!     let registry = OperationRegistry::from_tree(&tree)?;
//!     for id in registry.ids() {
//!         println!("{}", id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod operation;
pub mod registry;
pub mod validator;

pub use error::ProtocolError;
pub use loader::{SpecLoader, SpecTree};
pub use operation::{
    Assignment, BodySpec, FileMapping, FileSpec, OperationSpec, ParamDecl, PathSegment, PathSpec,
    QueryEntry, RequestSpec, OMIT_DEFAULT,
};
pub use registry::OperationRegistry;
pub use validator::SpecValidator;
