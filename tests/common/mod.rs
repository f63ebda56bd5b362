//! Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use elevenlabs_rust::transport::{
    PreparedRequest, StreamingResponse, Transport, TransportError, TransportResponse,
};
use elevenlabs_rust::types::FileHandle;
use elevenlabs_rust::{ElevenLabsClient, Result};
use reqwest::header::HeaderMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://api.elevenlabs.test";

/// What the fake answers with.
#[derive(Clone)]
pub enum Reply {
    Body { status: u16, chunks: Vec<Bytes> },
    Timeout,
}

/// Records every prepared request and answers with a fixed reply.
pub struct RecordingTransport {
    reply: Reply,
    seen: Mutex<Vec<PreparedRequest>>,
}

impl RecordingTransport {
    pub fn ok(body: &'static [u8]) -> Arc<Self> {
        Self::with_status(200, &[body])
    }

    pub fn with_status(status: u16, chunks: &[&'static [u8]]) -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Body {
                status,
                chunks: chunks.iter().copied().map(Bytes::from_static).collect(),
            },
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn timing_out() -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Timeout,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> PreparedRequest {
        self.requests().pop().expect("no request was sent")
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse> {
        self.seen.lock().unwrap().push(request);
        match &self.reply {
            Reply::Body { status, chunks } => Ok(TransportResponse {
                status: *status,
                headers: HeaderMap::new(),
                body: Bytes::from(chunks.concat()),
            }),
            Reply::Timeout => Err(TransportError::Timeout("deadline elapsed".into()).into()),
        }
    }

    async fn send_streaming(&self, request: PreparedRequest) -> Result<StreamingResponse> {
        self.seen.lock().unwrap().push(request);
        match &self.reply {
            Reply::Body { status, chunks } => {
                let items: Vec<Result<Bytes>> = chunks.iter().cloned().map(Ok).collect();
                Ok(StreamingResponse {
                    status: *status,
                    headers: HeaderMap::new(),
                    body: Box::pin(futures::stream::iter(items)),
                })
            }
            Reply::Timeout => Err(TransportError::Timeout("deadline elapsed".into()).into()),
        }
    }
}

/// Client over the embedded spec tree talking to `transport`.
pub fn client(transport: Arc<RecordingTransport>) -> ElevenLabsClient {
    ElevenLabsClient::builder()
        .api_key("test-key")
        .base_url(BASE_URL)
        .transport(transport)
        .build()
        .expect("client builds")
}

/// In-memory handle that counts how often it was closed.
pub struct CountingHandle {
    data: Cursor<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl CountingHandle {
    pub fn new(data: &[u8]) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                data: Cursor::new(data.to_vec()),
                closes: closes.clone(),
            },
            closes,
        )
    }
}

impl Read for CountingHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl FileHandle for CountingHandle {
    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
