use crate::client::http::DEFAULT_TIMEOUT;
use crate::transport::{
    with_read_timeout, MultipartField, PreparedRequest, RequestBody, StreamingResponse, Transport,
    TransportError, TransportResponse,
};
use crate::{BoxStream, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Proxy;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// reqwest-backed [`Transport`] with a pooled client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with env-overridable pool and proxy settings.
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(DEFAULT_TIMEOUT)
    }

    /// Like [`new`](Self::new), bounding TCP/TLS connection setup by `connect_timeout`.
    ///
    /// Per-call timeouts are enforced separately for each phase of an exchange.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(
                env::var("ELEVENLABS_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("ELEVENLABS_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )))
            // Long audio streams keep connections open for minutes.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("ELEVENLABS_PROXY_URL") {
            match Proxy::all(&proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;
        Ok(Self { client })
    }

    /// Wrap an existing client, e.g. one configured with custom TLS roots.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: PreparedRequest) -> Result<reqwest::RequestBuilder> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)?),
        };
        Ok(builder)
    }
}

fn build_form(fields: Vec<MultipartField>) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        match field {
            MultipartField::Text {
                name,
                value,
                content_type,
                headers,
            } => {
                let mut part = Part::text(value);
                if let Some(ct) = content_type {
                    part = part.mime_str(&ct)?;
                }
                form = form.part(name, with_headers(part, &headers)?);
            }
            MultipartField::File {
                name,
                data,
                filename,
                content_type,
                headers,
            } => {
                let mut part = Part::bytes(data.to_vec()).mime_str(&content_type)?;
                if let Some(filename) = filename {
                    part = part.file_name(filename);
                }
                form = form.part(name, with_headers(part, &headers)?);
            }
        }
    }
    Ok(form)
}

fn with_headers(part: Part, headers: &BTreeMap<String, String>) -> Result<Part> {
    if headers.is_empty() {
        return Ok(part);
    }
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            crate::Error::validation(format!("invalid multipart header name '{}': {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            crate::Error::validation(format!("invalid multipart header value: {}", e))
        })?;
        map.insert(name, value);
    }
    Ok(part.headers(map))
}

fn map_send_error(e: reqwest::Error) -> crate::Error {
    if e.is_timeout() {
        crate::Error::Transport(TransportError::Timeout(e.to_string()))
    } else {
        crate::Error::Transport(TransportError::Http(e))
    }
}

/// Status, headers and a read-timed body stream.
type Opened = (u16, HeaderMap, BoxStream<'static, Bytes>);

/// Send and wait for the status line and headers, bounded by `timeout`.
///
/// The body that follows is bounded per chunk by the same `timeout`.
async fn open(builder: reqwest::RequestBuilder, timeout: Duration) -> Result<Opened> {
    let response = match tokio::time::timeout(timeout, builder.send()).await {
        Ok(sent) => sent.map_err(map_send_error)?,
        Err(_) => {
            return Err(crate::Error::Transport(TransportError::Timeout(format!(
                "no response headers within {:?}",
                timeout
            ))))
        }
    };
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body: BoxStream<'static, Bytes> = Box::pin(response.bytes_stream().map_err(map_send_error));
    Ok((status, headers, with_read_timeout(body, timeout)))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse> {
        let timeout = request.timeout;
        let (status, headers, mut body) = open(self.build(request)?, timeout).await?;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(TransportResponse {
            status,
            headers,
            body: buf.freeze(),
        })
    }

    async fn send_streaming(&self, request: PreparedRequest) -> Result<StreamingResponse> {
        let timeout = request.timeout;
        let (status, headers, body) = open(self.build(request)?, timeout).await?;
        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_multipart_form_with_part_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Part".to_string(), "1".to_string());
        let form = build_form(vec![
            MultipartField::text("name", "voice"),
            MultipartField::File {
                name: "files".into(),
                data: Bytes::from_static(b"abc"),
                filename: Some("a.wav".into()),
                content_type: "audio/wav".into(),
                headers,
            },
        ])
        .unwrap();
        assert!(!form.boundary().is_empty());
    }

    #[test]
    fn rejects_bad_mime() {
        let result = build_form(vec![MultipartField::File {
            name: "f".into(),
            data: Bytes::new(),
            filename: None,
            content_type: "not a mime".into(),
            headers: BTreeMap::new(),
        }]);
        assert!(result.is_err());
    }
}
