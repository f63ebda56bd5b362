//! # elevenlabs-rust
//!
//! 基于操作规范驱动的 ElevenLabs API 客户端：请求组装、多部件上传与流式执行。
//!
//! Specification-driven client for the ElevenLabs HTTP API. Every endpoint is
//! described declaratively by an operation spec; this crate turns flat
//! arguments into a correctly shaped request, sends it, and returns either a
//! decoded response or a lazily consumed byte stream.
//!
//! ## Overview
//!
//! - **Spec-Driven**: operations live in a resource tree (JSON or YAML), not in code
//! - **Omission-Aware**: arguments distinguish "not supplied" from explicit null
//! - **Streaming-First**: audio endpoints return a pull-driven [`BoxStream`]
//! - **Deterministic Cleanup**: upload handles are closed exactly once on success,
//!   failure or early stream drop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use elevenlabs_rust::{Arguments, ElevenLabsClient};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> elevenlabs_rust::Result<()> {
//!     let client = ElevenLabsClient::builder().api_key("your-api-key").build()?;
//!
//!     let history = client
//!         .history()
//!         .call("list", Arguments::new().with("page_size", 5))
//!         .await?;
//!     println!("{:?}", history.as_json());
//!
//!     let mut audio = client.text_to_speech().stream(
//!         "convert",
//!         Arguments::new()
//!             .with("voice_id", "21m00Tcm4TlvDq8ikWAM")
//!             .with("text", "Hello there"),
//!     )?;
//!     while let Some(chunk) = audio.next().await {
//!         let _bytes = chunk?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Argument model, upload sources, response bodies |
//! | [`protocol`] | Operation specs, spec tree loading, registry |
//! | [`request`] | Path / query / body / file assembly |
//! | [`transport`] | Transport trait and the reqwest implementation |
//! | [`client`] | HTTP adapter, executor, client and builder |
//! | [`environment`] | Deployment environments |

pub mod client;
pub mod environment;
pub mod protocol;
pub mod request;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{
    ElevenLabsClient, ElevenLabsClientBuilder, Execution, HttpClient, OperationExecutor, Resource,
};
pub use environment::Environment;
pub use protocol::{OperationRegistry, OperationSpec};
pub use types::{Arg, Arguments, ParamValue, RequestOptions, ResponseBody, UploadSource};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, HttpError};
