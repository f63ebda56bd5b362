//! Transport adapter: turns a [`CallRequest`] into a wire request and decodes the answer.

use crate::client::cleanup::CleanupGuard;
use crate::request::{flatten_pairs, prepare_parts, CallRequest};
use crate::transport::{MultipartField, PreparedRequest, RequestBody, Transport, TransportError};
use crate::types::{FileOpener, FsOpener, ResponseBody};
use crate::{BoxStream, Error, ErrorContext, HttpError, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

pub const SDK_NAME: &str = "elevenlabs-rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SDK_LANGUAGE: &str = "Rust";
/// Credential header sent with every request when an API key is configured.
pub const API_KEY_HEADER: &str = "xi-api-key";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

/// Sends assembled calls through a [`Transport`].
///
/// Cheap to clone; clones share the transport and file opener.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: Option<String>,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    opener: Arc<dyn FileOpener>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

enum StreamState {
    Pending(Box<(HttpClient, CallRequest)>),
    Streaming {
        body: BoxStream<'static, Bytes>,
        guard: CleanupGuard,
    },
    Done,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key: None,
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            opener: Arc::new(FsOpener),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn FileOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the call and decode the whole response.
    ///
    /// Handles registered while preparing the body are closed before this returns,
    /// whether the call succeeded or not.
    pub async fn request(&self, call: CallRequest) -> Result<ResponseBody> {
        let request_id = Uuid::new_v4().to_string();
        let mut guard = CleanupGuard::new();
        let prepared = self.prepare(&call, &mut guard).await?;

        let start = Instant::now();
        let sent = self.transport.send(prepared).await;
        guard.release();
        let response = sent?;

        info!(
            http_method = call.method.as_str(),
            path = call.path.as_str(),
            http_status = response.status,
            request_id = request_id.as_str(),
            duration_ms = start.elapsed().as_millis(),
            streaming = false,
            "elevenlabs request finished"
        );

        if !(200..300).contains(&response.status) {
            return Err(HttpError::new(
                response.status,
                ResponseBody::decode(response.body),
                response.headers,
            )
            .into());
        }
        Ok(ResponseBody::decode(response.body))
    }

    /// Lazily send the call and yield body chunks as they arrive.
    ///
    /// Nothing is prepared or sent until the stream is first polled. A non-2xx
    /// status yields a single [`Error::Http`] item. Registered handles are closed
    /// once the stream is exhausted, fails, or is dropped.
    pub fn stream(&self, call: CallRequest) -> BoxStream<'static, Bytes> {
        let initial = StreamState::Pending(Box::new((self.clone(), call)));
        let stream = futures::stream::unfold(initial, |state| async move {
            match state {
                StreamState::Pending(pending) => {
                    let (client, call) = *pending;
                    match client.open_stream(call).await {
                        Ok((body, guard)) => next_chunk(body, guard).await,
                        Err(e) => Some((Err(e), StreamState::Done)),
                    }
                }
                StreamState::Streaming { body, guard } => next_chunk(body, guard).await,
                StreamState::Done => None,
            }
        });
        Box::pin(stream)
    }

    async fn open_stream(
        &self,
        call: CallRequest,
    ) -> Result<(BoxStream<'static, Bytes>, CleanupGuard)> {
        let request_id = Uuid::new_v4().to_string();
        let mut guard = CleanupGuard::new();
        let prepared = self.prepare(&call, &mut guard).await?;

        let start = Instant::now();
        let response = self.transport.send_streaming(prepared).await?;

        info!(
            http_method = call.method.as_str(),
            path = call.path.as_str(),
            http_status = response.status,
            request_id = request_id.as_str(),
            duration_ms = start.elapsed().as_millis(),
            streaming = true,
            "elevenlabs request started streaming"
        );

        if !(200..300).contains(&response.status) {
            let mut body = response.body;
            let mut collected = BytesMut::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(chunk) => collected.extend_from_slice(&chunk),
                    Err(e) => {
                        debug!(error = %e, "error body truncated");
                        break;
                    }
                }
            }
            guard.release();
            return Err(HttpError::new(
                response.status,
                ResponseBody::decode(collected.freeze()),
                response.headers,
            )
            .into());
        }
        Ok((response.body, guard))
    }

    /// Resolve URL, headers, body and timeout. Handles opened for the body are
    /// registered with `guard`.
    pub(crate) async fn prepare(
        &self,
        call: &CallRequest,
        guard: &mut CleanupGuard,
    ) -> Result<PreparedRequest> {
        let method = Method::from_bytes(call.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            Error::validation_with_context(
                format!("unsupported HTTP method '{}'", call.method),
                ErrorContext::new().with_source("http_client"),
            )
        })?;
        let url = self.url_for(&call.path)?;

        let mut operation_headers = call.headers.clone();
        let body = if call.is_multipart() {
            RequestBody::Multipart(self.read_parts(call, guard).await?)
        } else if let Some(json) = &call.json {
            if !operation_headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
            {
                operation_headers.insert("Content-Type".to_string(), "application/json".to_string());
            }
            RequestBody::Json(serde_json::to_vec(json)?)
        } else if let Some(form) = &call.form {
            match form {
                Value::Object(map) => RequestBody::Form(flatten_pairs(map)),
                _ => {
                    return Err(Error::validation_with_context(
                        "form body must be an object",
                        ErrorContext::new().with_source("http_client"),
                    ))
                }
            }
        } else {
            RequestBody::Empty
        };

        let headers = self.layer_headers(&operation_headers, &call.request_options.additional_headers)?;

        Ok(PreparedRequest {
            method,
            url,
            query: flatten_pairs(&call.query),
            headers,
            body,
            timeout: call.request_options.timeout.unwrap_or(self.timeout),
        })
    }

    /// Open and read upload parts on the blocking pool; file access blocks.
    async fn read_parts(
        &self,
        call: &CallRequest,
        guard: &mut CleanupGuard,
    ) -> Result<Vec<MultipartField>> {
        let files = call.files.clone();
        let form = call.form.clone();
        let opener = self.opener.clone();
        let (parts, opened) = tokio::task::spawn_blocking(move || {
            let mut opened = CleanupGuard::new();
            let parts = prepare_parts(&files, form.as_ref(), opener.as_ref(), &mut opened);
            (parts, opened)
        })
        .await
        .map_err(|e| {
            Error::Transport(TransportError::Other(format!(
                "reading upload parts failed: {}",
                e
            )))
        })?;
        guard.absorb(opened);
        parts
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid request URL '{}': {}", joined, e),
                ErrorContext::new().with_source("http_client"),
            )
        })
    }

    /// defaults < client headers < operation headers < credential < request options
    fn layer_headers(
        &self,
        operation: &BTreeMap<String, String>,
        additional: &BTreeMap<String, String>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let user_agent = format!("{}/{}", SDK_NAME, SDK_VERSION);
        let defaults = [
            ("User-Agent", user_agent.as_str()),
            ("X-Fern-Language", SDK_LANGUAGE),
            ("X-Fern-SDK-Name", SDK_NAME),
            ("X-Fern-SDK-Version", SDK_VERSION),
        ];
        for (name, value) in defaults {
            insert_header(&mut headers, name, value)?;
        }
        for (name, value) in self.headers.iter().chain(operation.iter()) {
            insert_header(&mut headers, name, value)?;
        }
        if let Some(key) = &self.api_key {
            insert_header(&mut headers, API_KEY_HEADER, key)?;
        }
        for (name, value) in additional {
            insert_header(&mut headers, name, value)?;
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        Error::validation_with_context(
            format!("invalid header name: {}", e),
            ErrorContext::new().with_field_path(name).with_source("http_client"),
        )
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        Error::validation_with_context(
            format!("invalid header value: {}", e),
            ErrorContext::new().with_field_path(name).with_source("http_client"),
        )
    })?;
    headers.insert(header_name, header_value);
    Ok(())
}

async fn next_chunk(
    mut body: BoxStream<'static, Bytes>,
    mut guard: CleanupGuard,
) -> Option<(Result<Bytes>, StreamState)> {
    loop {
        match body.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => return Some((Ok(chunk), StreamState::Streaming { body, guard })),
            Some(Err(e)) => {
                guard.release();
                return Some((Err(e), StreamState::Done));
            }
            None => {
                guard.release();
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ResolvedFile;
    use crate::transport::{StreamingResponse, TransportResponse};
    use crate::types::upload::tests::CountingHandle;
    use crate::types::{ParamValue, RequestOptions, SharedHandle, UploadSource};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    /// Records every request and answers with a canned response.
    struct CannedTransport {
        status: u16,
        chunks: Vec<&'static [u8]>,
        seen: Mutex<Vec<PreparedRequest>>,
    }

    impl CannedTransport {
        fn new(status: u16, chunks: &[&'static [u8]]) -> Arc<Self> {
            Arc::new(Self {
                status,
                chunks: chunks.to_vec(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> PreparedRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(&self, request: PreparedRequest) -> Result<TransportResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(TransportResponse {
                status: self.status,
                headers: HeaderMap::new(),
                body: Bytes::from(self.chunks.concat()),
            })
        }

        async fn send_streaming(&self, request: PreparedRequest) -> Result<StreamingResponse> {
            self.seen.lock().unwrap().push(request);
            let chunks: Vec<Result<Bytes>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect();
            Ok(StreamingResponse {
                status: self.status,
                headers: HeaderMap::new(),
                body: Box::pin(futures::stream::iter(chunks)),
            })
        }
    }

    fn client(transport: Arc<CannedTransport>) -> HttpClient {
        HttpClient::new(transport, "https://api.example.test/")
            .with_api_key(Some("secret".into()))
    }

    #[tokio::test]
    async fn layers_headers_in_order() {
        let transport = CannedTransport::new(200, &[b"{}"]);
        let mut base = BTreeMap::new();
        base.insert("X-Client".to_string(), "client".to_string());
        base.insert("X-Shared".to_string(), "client".to_string());
        base.insert("xi-api-key".to_string(), "overridden-by-credential".to_string());
        let http = client(transport.clone()).with_headers(base);

        let call = CallRequest::new("get", "v1/user")
            .with_header("X-Shared", "operation")
            .with_request_options(RequestOptions::new().with_header("X-Trace", "1"));
        http.request(call).await.unwrap();

        let req = transport.last();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.url.as_str(), "https://api.example.test/v1/user");
        assert_eq!(req.header("X-Client"), Some("client"));
        assert_eq!(req.header("X-Shared"), Some("operation"));
        assert_eq!(req.header("xi-api-key"), Some("secret"));
        assert_eq!(req.header("X-Trace"), Some("1"));
        assert_eq!(req.header("X-Fern-Language"), Some("Rust"));
        assert_eq!(req.header("X-Fern-SDK-Name"), Some(SDK_NAME));
        assert_eq!(req.header("X-Fern-SDK-Version"), Some(SDK_VERSION));
        assert!(req.header("User-Agent").unwrap().starts_with("elevenlabs-rust/"));
    }

    #[tokio::test]
    async fn request_options_override_credential() {
        let transport = CannedTransport::new(200, &[]);
        let call = CallRequest::new("GET", "v1/user")
            .with_request_options(RequestOptions::new().with_header("xi-api-key", "other"));
        client(transport.clone()).request(call).await.unwrap();
        assert_eq!(transport.last().header("xi-api-key"), Some("other"));
    }

    #[tokio::test]
    async fn json_body_sets_content_type_unless_present() {
        let transport = CannedTransport::new(200, &[]);
        let http = client(transport.clone());

        http.request(CallRequest::new("POST", "v1/x").with_json(json!({"a": 1})))
            .await
            .unwrap();
        let req = transport.last();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_json(), Some(json!({"a": 1})));

        http.request(
            CallRequest::new("POST", "v1/x")
                .with_json(json!({"a": 1}))
                .with_header("Content-Type", "application/vnd.custom+json"),
        )
        .await
        .unwrap();
        assert_eq!(
            transport.last().header("content-type"),
            Some("application/vnd.custom+json")
        );
    }

    #[tokio::test]
    async fn body_precedence() {
        let transport = CannedTransport::new(200, &[]);
        let http = client(transport.clone());

        http.request(
            CallRequest::new("POST", "v1/x")
                .with_json(json!({"a": 1}))
                .with_form(json!({"b": 2})),
        )
        .await
        .unwrap();
        assert!(matches!(transport.last().body, RequestBody::Json(_)));

        http.request(CallRequest::new("POST", "v1/x").with_form(json!({"b": 2})))
            .await
            .unwrap();
        match transport.last().body {
            RequestBody::Form(pairs) => assert_eq!(pairs, vec![("b".to_string(), "2".to_string())]),
            other => panic!("unexpected {:?}", other),
        }

        http.request(
            CallRequest::new("POST", "v1/x")
                .with_form(json!({"b": 2}))
                .force_multipart(true),
        )
        .await
        .unwrap();
        assert!(matches!(transport.last().body, RequestBody::Multipart(ref p) if p.len() == 1));

        http.request(CallRequest::new("DELETE", "v1/x")).await.unwrap();
        assert!(transport.last().body.is_empty());
    }

    #[tokio::test]
    async fn query_is_sent_as_assembled_and_timeout_falls_back() {
        let transport = CannedTransport::new(200, &[]);
        let http = client(transport.clone()).with_timeout(Duration::from_secs(10));

        // Option query parameters are merged by build_query, not here.
        http.request(
            CallRequest::new("GET", "v1/history")
                .with_query("page_size", 5)
                .with_request_options(
                    RequestOptions::new()
                        .with_query_parameter("extra", "x")
                        .with_timeout(Duration::from_secs(2)),
                ),
        )
        .await
        .unwrap();
        let req = transport.last();
        assert_eq!(req.query, vec![("page_size".to_string(), "5".to_string())]);
        assert_eq!(req.timeout, Duration::from_secs(2));

        http.request(CallRequest::new("GET", "v1/history")).await.unwrap();
        assert_eq!(transport.last().timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn decodes_bodies_and_errors() {
        let ok = client(CannedTransport::new(200, &[b"{\"ok\":", b"true}"]));
        assert_eq!(
            ok.request(CallRequest::new("GET", "v1/x")).await.unwrap(),
            ResponseBody::Json(json!({"ok": true}))
        );

        let raw = client(CannedTransport::new(200, &[b"audio-bytes"]));
        assert_eq!(
            raw.request(CallRequest::new("GET", "v1/x")).await.unwrap().as_text(),
            Some("audio-bytes")
        );

        let empty = client(CannedTransport::new(204, &[]));
        assert!(empty.request(CallRequest::new("GET", "v1/x")).await.unwrap().is_empty());

        let failing = client(CannedTransport::new(422, &[b"{\"detail\":\"bad\"}"]));
        let err = failing.request(CallRequest::new("GET", "v1/x")).await.unwrap_err();
        let http = err.as_http().unwrap();
        assert_eq!(http.status, 422);
        assert_eq!(http.body.as_json(), Some(&json!({"detail": "bad"})));
    }

    fn upload_call() -> (CallRequest, Arc<std::sync::atomic::AtomicUsize>) {
        let (handle, closes) = CountingHandle::new(b"sample");
        let upload = UploadSource::from_stream(SharedHandle::new(handle))
            .with_filename("s.wav")
            .with_auto_close(true);
        let call = CallRequest::new("POST", "v1/voices/add").with_file(ResolvedFile {
            name: "files".into(),
            value: ParamValue::Upload(upload),
            filename: None,
            content_type: None,
            headers: BTreeMap::new(),
        });
        (call, closes)
    }

    #[tokio::test]
    async fn closes_uploads_after_success_and_failure() {
        for status in [200, 500] {
            let (call, closes) = upload_call();
            let _ = client(CannedTransport::new(status, &[])).request(call).await;
            assert_eq!(closes.load(Ordering::SeqCst), 1, "status {}", status);
        }
    }

    /// Serves one in-memory file and records which thread opened it.
    struct ThreadRecordingOpener {
        opened_on: Mutex<Option<std::thread::ThreadId>>,
    }

    impl FileOpener for ThreadRecordingOpener {
        fn open(&self, _path: &std::path::Path) -> std::io::Result<SharedHandle> {
            *self.opened_on.lock().unwrap() = Some(std::thread::current().id());
            Ok(SharedHandle::new(crate::types::MemoryFile::new(&b"RIFF"[..])))
        }
    }

    #[tokio::test]
    async fn path_uploads_are_read_off_the_runtime_thread() {
        let transport = CannedTransport::new(200, &[]);
        let opener = Arc::new(ThreadRecordingOpener {
            opened_on: Mutex::new(None),
        });
        let http = client(transport.clone()).with_opener(opener.clone());

        let call = CallRequest::new("POST", "v1/voices/add").with_file(ResolvedFile {
            name: "files".into(),
            value: ParamValue::Upload(UploadSource::from_path("/clips/take.wav")),
            filename: None,
            content_type: None,
            headers: BTreeMap::new(),
        });
        http.request(call).await.unwrap();

        let opened_on = opener.opened_on.lock().unwrap().expect("file was opened");
        assert_ne!(opened_on, std::thread::current().id());
        match &transport.last().body {
            RequestBody::Multipart(parts) => assert!(matches!(
                &parts[0],
                MultipartField::File { data, filename: Some(f), .. } if data.as_ref() == b"RIFF" && f == "take.wav"
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn stream_is_lazy_and_skips_empty_chunks() {
        let transport = CannedTransport::new(200, &[b"a", b"", b"b"]);
        let http = client(transport.clone());
        let (call, closes) = upload_call();

        let stream = http.stream(call);
        assert_eq!(transport.count(), 0);

        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert_eq!(transport.count(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_error_status_yields_single_error() {
        let transport = CannedTransport::new(401, &[b"{\"detail\":", b"\"unauthorized\"}"]);
        let (call, closes) = upload_call();
        let items: Vec<Result<Bytes>> = client(transport).stream(call).collect().await;
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            err.as_http().unwrap().body.as_json(),
            Some(&json!({"detail": "unauthorized"}))
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_stream_early_closes_uploads() {
        let transport = CannedTransport::new(200, &[b"a", b"b", b"c"]);
        let (call, closes) = upload_call();
        let mut stream = client(transport).stream(call);
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_unpolled_stream_leaves_caller_handles_open() {
        let transport = CannedTransport::new(200, &[b"a"]);
        let (call, closes) = upload_call();
        let stream = client(transport.clone()).stream(call);
        drop(stream);
        assert_eq!(transport.count(), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
