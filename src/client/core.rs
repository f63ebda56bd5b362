use crate::client::builder::ElevenLabsClientBuilder;
use crate::client::executor::{Execution, OperationExecutor};
use crate::client::http::HttpClient;
use crate::protocol::{registry::resource_key, OperationRegistry, OperationSpec, ProtocolError};
use crate::types::{Arguments, ResponseBody};
use crate::{BoxStream, Result};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use std::sync::Arc;

/// Entry point for calling ElevenLabs operations by identifier.
///
/// Cheap to clone; clones share the transport and the operation registry.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    executor: OperationExecutor,
    registry: Arc<OperationRegistry>,
}

impl ElevenLabsClient {
    pub fn builder() -> ElevenLabsClientBuilder {
        ElevenLabsClientBuilder::new()
    }

    /// Client for the production environment with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    pub(crate) fn from_parts(http: HttpClient, registry: Arc<OperationRegistry>) -> Self {
        Self {
            executor: OperationExecutor::new(http),
            registry,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn http(&self) -> &HttpClient {
        self.executor.http()
    }

    pub fn operation(&self, id: &str) -> Result<Arc<OperationSpec>> {
        Ok(self.registry.get(id)?)
    }

    /// Run an operation; streaming operations come back as [`Execution::Stream`].
    pub async fn execute(&self, id: &str, args: Arguments) -> Result<Execution> {
        let spec = self.registry.get(id)?;
        self.executor.execute(&spec, args).await
    }

    /// Run an operation and return the whole response body.
    ///
    /// Streaming operations are drained and decoded like buffered ones.
    pub async fn call(&self, id: &str, args: Arguments) -> Result<ResponseBody> {
        match self.execute(id, args).await? {
            Execution::Response(body) => Ok(body),
            Execution::Stream(stream) => {
                let bytes = stream
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await?;
                Ok(ResponseBody::decode(bytes.freeze()))
            }
        }
    }

    /// Run any operation as a lazy byte stream, whether or not it is declared streaming.
    pub fn stream(&self, id: &str, args: Arguments) -> Result<BoxStream<'static, Bytes>> {
        let spec = self.registry.get(id)?;
        let call = OperationExecutor::resolve(&spec, args)?;
        Ok(self.executor.http().stream(call))
    }

    /// Navigate to a resource by dotted path, e.g. `voices.pvc.samples`.
    pub fn resource(&self, path: &str) -> Result<Resource> {
        let key = path
            .split('.')
            .map(resource_key)
            .collect::<Vec<_>>()
            .join(".");
        if !self.registry.has_resource(&key) {
            return Err(ProtocolError::NotFound {
                id: path.to_string(),
                hint: None,
            }
            .with_hint("Run `elevenlabs-spec list` to see available resources")
            .into());
        }
        Ok(Resource {
            client: self.clone(),
            path: key,
        })
    }

    fn top_level(&self, name: &str) -> Resource {
        Resource {
            client: self.clone(),
            path: name.to_string(),
        }
    }

    pub fn history(&self) -> Resource {
        self.top_level("history")
    }

    pub fn voices(&self) -> Resource {
        self.top_level("voices")
    }

    pub fn text_to_speech(&self) -> Resource {
        self.top_level("text_to_speech")
    }

    pub fn models(&self) -> Resource {
        self.top_level("models")
    }

    pub fn speech_to_text(&self) -> Resource {
        self.top_level("speech_to_text")
    }

    pub fn user(&self) -> Resource {
        self.top_level("user")
    }
}

/// A node of the resource tree bound to a client.
#[derive(Debug, Clone)]
pub struct Resource {
    client: ElevenLabsClient,
    path: String,
}

impl Resource {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn resource(&self, child: &str) -> Result<Resource> {
        self.client.resource(&format!("{}.{}", self.path, child))
    }

    /// Operation names available directly on this resource.
    pub fn operations(&self) -> Vec<String> {
        self.client.registry.operations_of(&self.path)
    }

    fn id(&self, operation: &str) -> String {
        format!("{}.{}", self.path, operation)
    }

    pub async fn execute(&self, operation: &str, args: Arguments) -> Result<Execution> {
        self.client.execute(&self.id(operation), args).await
    }

    pub async fn call(&self, operation: &str, args: Arguments) -> Result<ResponseBody> {
        self.client.call(&self.id(operation), args).await
    }

    pub fn stream(&self, operation: &str, args: Arguments) -> Result<BoxStream<'static, Bytes>> {
        self.client.stream(&self.id(operation), args)
    }
}
