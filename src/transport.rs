//! Transport seam between the request pipeline and the network.
//!
//! The pipeline hands a fully prepared request to a [`Transport`]; the default
//! implementation is [`http::ReqwestTransport`]. Tests substitute in-process
//! fakes.

pub mod http;

pub use http::ReqwestTransport;

use crate::BoxStream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Everything needed to put one request on the wire.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    /// Flattened query pairs, repeated keys allowed.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Per-phase limit: opening the exchange (connect through response
    /// headers) and each wait for the next body chunk. Not a total deadline.
    pub timeout: Duration,
}

impl PreparedRequest {
    /// Header value as text, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First query value for `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Request body in its encoded form.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized JSON document.
    Json(Vec<u8>),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartField>),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Parsed JSON body, when the body is JSON.
    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            RequestBody::Json(bytes) => serde_json::from_slice(bytes).ok(),
            _ => None,
        }
    }
}

/// One part of a multipart payload.
#[derive(Debug, Clone)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
        content_type: Option<String>,
        headers: BTreeMap<String, String>,
    },
    File {
        name: String,
        data: Bytes,
        filename: Option<String>,
        content_type: String,
        headers: BTreeMap<String, String>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        MultipartField::Text {
            name: name.into(),
            value: value.into(),
            content_type: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MultipartField::Text { name, .. } | MultipartField::File { name, .. } => name,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, MultipartField::File { .. })
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A response whose body is still arriving.
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Bytes>,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends prepared requests. Implementations must be shareable across calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send and buffer the whole response body.
    async fn send(&self, request: PreparedRequest) -> crate::Result<TransportResponse>;

    /// Send and return as soon as the status line and headers arrive.
    async fn send_streaming(&self, request: PreparedRequest) -> crate::Result<StreamingResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Http(e) => e.is_timeout(),
            TransportError::Other(_) => false,
        }
    }
}

/// Fail the stream when no chunk arrives within `timeout` of the previous one.
///
/// A body that keeps delivering data is never cut off, however long it runs.
pub fn with_read_timeout(
    body: BoxStream<'static, Bytes>,
    timeout: Duration,
) -> BoxStream<'static, Bytes> {
    let stream = futures::stream::unfold(Some(body), move |state| async move {
        let Some(mut body) = state else {
            return None;
        };
        match tokio::time::timeout(timeout, body.next()).await {
            Ok(Some(item)) => Some((item, Some(body))),
            Ok(None) => None,
            Err(_) => Some((
                Err(crate::Error::Transport(TransportError::Timeout(format!(
                    "no response data within {:?}",
                    timeout
                )))),
                None,
            )),
        }
    });
    Box::pin(stream)
}

impl From<reqwest::Error> for crate::Error {
    fn from(e: reqwest::Error) -> Self {
        crate::Error::Transport(TransportError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn paced(gaps_ms: &'static [u64]) -> BoxStream<'static, Bytes> {
        let stream = futures::stream::iter(gaps_ms.iter().copied()).then(|gap| async move {
            tokio::time::sleep(Duration::from_millis(gap)).await;
            Ok(Bytes::from_static(b"x"))
        });
        Box::pin(stream)
    }

    #[tokio::test]
    async fn steady_body_outlives_the_read_timeout() {
        let start = Instant::now();
        let chunks: Vec<_> = with_read_timeout(paced(&[40, 40, 40, 40, 40]), Duration::from_millis(120))
            .collect()
            .await;
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.is_ok()));
        assert!(start.elapsed() > Duration::from_millis(120));
    }

    #[tokio::test]
    async fn stalled_body_times_out_once() {
        let mut body = with_read_timeout(paced(&[10, 400]), Duration::from_millis(100));
        assert!(body.next().await.unwrap().is_ok());
        let err = body.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(body.next().await.is_none());
    }
}
