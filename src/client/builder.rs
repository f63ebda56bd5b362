use crate::client::core::ElevenLabsClient;
use crate::client::http::{HttpClient, DEFAULT_TIMEOUT};
use crate::environment::{resolve_base_url, Environment};
use crate::protocol::OperationRegistry;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::FileOpener;
use crate::Result;
use keyring::Entry;
use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KEYRING_SERVICE: &str = "elevenlabs";
const KEYRING_USER: &str = "api_key";

/// Builder for [`ElevenLabsClient`].
///
/// Anything not set explicitly falls back to the environment:
/// - `ELEVENLABS_API_KEY`, then the OS keyring (service `elevenlabs`, user `api_key`)
/// - `ELEVENLABS_BASE_URL` / `ELEVENLABS_ENVIRONMENT` (default `production`)
/// - `ELEVENLABS_TIMEOUT_SECS` (default 240)
pub struct ElevenLabsClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    environment: Option<String>,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
    opener: Option<Arc<dyn FileOpener>>,
    registry: Option<Arc<OperationRegistry>>,
    ambient_credentials: bool,
}

impl ElevenLabsClientBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            environment: None,
            headers: BTreeMap::new(),
            timeout: None,
            transport: None,
            opener: None,
            registry: None,
            ambient_credentials: true,
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Explicit base URL; takes precedence over any environment.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment.name().to_string());
        self
    }

    /// Environment by name; unknown names fail at [`build`](Self::build).
    pub fn environment_name(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the network transport, e.g. with an in-process fake.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn file_opener(mut self, opener: Arc<dyn FileOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Use a custom operation registry instead of the embedded one.
    pub fn registry(mut self, registry: Arc<OperationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Whether a missing API key is looked up in the environment and keyring.
    pub fn ambient_credentials(mut self, enable: bool) -> Self {
        self.ambient_credentials = enable;
        self
    }

    pub fn build(self) -> Result<ElevenLabsClient> {
        let api_key = match self.api_key {
            Some(key) => Some(key),
            None if self.ambient_credentials => Self::lookup_api_key(),
            None => None,
        };

        let explicit_url = self.base_url.or_else(|| env::var("ELEVENLABS_BASE_URL").ok());
        let environment = self
            .environment
            .or_else(|| env::var("ELEVENLABS_ENVIRONMENT").ok())
            .unwrap_or_else(|| Environment::default().name().to_string());
        let base_url = resolve_base_url(explicit_url.as_deref(), &environment)?;

        let timeout = self
            .timeout
            .or_else(|| {
                env::var("ELEVENLABS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
            })
            .unwrap_or(DEFAULT_TIMEOUT);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_connect_timeout(timeout)?),
        };
        let registry = match self.registry {
            Some(registry) => registry,
            None => OperationRegistry::embedded()?,
        };

        let mut http = HttpClient::new(transport, base_url)
            .with_api_key(api_key)
            .with_headers(self.headers)
            .with_timeout(timeout);
        if let Some(opener) = self.opener {
            http = http.with_opener(opener);
        }

        debug!(
            base_url = http.base_url(),
            timeout_secs = timeout.as_secs(),
            has_api_key = http.has_api_key(),
            operations = registry.len(),
            "elevenlabs client configured"
        );
        Ok(ElevenLabsClient::from_parts(http, registry))
    }

    fn lookup_api_key() -> Option<String> {
        // 1. Environment variable
        if let Ok(key) = env::var("ELEVENLABS_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }

        // 2. OS keyring
        Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .ok()
            .and_then(|entry| entry.get_password().ok())
    }
}

impl Default for ElevenLabsClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
