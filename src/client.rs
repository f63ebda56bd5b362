//! Client layer for executing ElevenLabs operations.
//!
//! Keep the public surface small: [`ElevenLabsClient`] resolves operation ids,
//! [`OperationExecutor`] turns specs into calls and [`HttpClient`] puts them on
//! the wire. Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod cleanup;
pub mod core;
pub mod executor;
pub mod http;

pub use builder::ElevenLabsClientBuilder;
pub use cleanup::CleanupGuard;
pub use core::{ElevenLabsClient, Resource};
pub use executor::{Execution, OperationExecutor};
pub use http::HttpClient;
