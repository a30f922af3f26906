use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use url::Url;

use crate::auth::TokenStore;
use crate::errors::BuildError;
use crate::request::TransmissionFlags;

const DEFAULT_USER_AGENT: &str = concat!("deepjson", "@", env!("CARGO_PKG_VERSION"),);

/// Request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Storage mode tag used when none is configured. Informational only.
pub const DEFAULT_STORAGE_MODE: &str = "memory";

/// Plain, deserializable connection settings.
///
/// Lets applications keep their DeepJSON settings in a JSON or TOML file:
/// ```
/// # use deepjson::{ConnectionConfig, DeepJsonClient};
/// let config: ConnectionConfig = serde_json::from_str(
///     r#"{ "base_url": "https://db.example.com", "timeout_secs": 5 }"#,
/// ).unwrap();
/// let client = DeepJsonClient::from_config(&config)?;
/// # Ok::<_, deepjson::BuildError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Server base URL, e.g. `https://db.example.com`.
    pub base_url: String,
    /// Bearer token from an earlier login.
    #[serde(default)]
    pub token: Option<String>,
    /// HTTP request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Storage mode tag (informational).
    #[serde(default)]
    pub storage: Option<String>,
    /// Extra user-agent segment appended to the default one.
    #[serde(default)]
    pub user_agent_extra: Option<String>,
}

#[derive(Debug, Clone, Default)]
#[must_use]
/// Configures a [`DeepJsonClient`] before construction.
///
/// # Defaults
/// - HTTP request timeout: 10 seconds
/// - Storage mode: `memory`
/// - User-agent: `deepjson@<crate-version>` plus any [`Self::user_agent_extra`]
/// - No token
///
/// # Example
/// ```
/// use std::time::Duration;
/// # use deepjson::DeepJsonClient;
/// let client = DeepJsonClient::builder()
///     .base_url("https://db.example.com")
///     .request_timeout(Duration::from_secs(30))
///     .user_agent_extra("myapp/1.2.3")
///     .build()?;
/// # Ok::<_, deepjson::BuildError>(())
/// ```
pub struct DeepJsonClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    http_request_timeout: Option<Duration>,
    storage: Option<String>,

    /// Optional user-agent segment appended to the default UA for app-level telemetry.
    user_agent_extra: Option<String>,
}

impl DeepJsonClientBuilder {
    /// Server base URL. Required.
    pub fn base_url<S: Into<String>>(&mut self, base_url: S) -> &mut Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Start with a known bearer token.
    pub fn token(&mut self, token: Option<String>) -> &mut Self {
        self.token = token;
        self
    }

    /// Set HTTP requests timeout.
    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.http_request_timeout = Some(timeout);
        self
    }

    /// Storage mode tag. The SDK only reports it back via [`DeepJsonClient::storage`].
    pub fn storage<S: Into<String>>(&mut self, storage: S) -> &mut Self {
        self.storage = Some(storage.into());
        self
    }

    /// Append an extra user-agent segment after the default `deepjson@<version>`.
    /// Example: `.user_agent_extra("myapp/1.2.3")`
    pub fn user_agent_extra<S: Into<String>>(&mut self, extra: S) -> &mut Self {
        self.user_agent_extra = Some(extra.into());
        self
    }

    /// Build [DeepJsonClient]
    pub fn build(&self) -> Result<DeepJsonClient, BuildError> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(BuildError::MissingBaseUrl)?;
        let base_url = Url::parse(raw)?;

        // Compose user agent with optional extra part.
        let user_agent = match &self.user_agent_extra {
            Some(extra) if !extra.trim().is_empty() => {
                format!("{DEFAULT_USER_AGENT} {}", extra.trim())
            }
            _ => DEFAULT_USER_AGENT.to_string(),
        };

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let timeout = self
            .http_request_timeout
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(DeepJsonClient {
            http,
            base_url,
            token: TokenStore::new(self.token.clone()),
            flags: Arc::new(Mutex::new(TransmissionFlags::default())),
            storage: self
                .storage
                .clone()
                .unwrap_or_else(|| DEFAULT_STORAGE_MODE.to_string()),
            timeout,
        })
    }
}

/// Client for the DeepJSON key-value HTTP API.
///
/// `DeepJsonClient` owns:
/// - A reqwest HTTP client (connection pool, timeout, default headers).
/// - The shared bearer [`TokenStore`].
/// - The one-shot [`TransmissionFlags`] consumed by the next CRUD call.
///
/// ### What it does
/// - Maps `get`/`post`/`put`/`delete`/`move`/`upload`/`list` onto the server's
///   `/keys/{key}` and `/cmd/*` endpoints.
/// - Authenticates via [`DeepJsonClient::login`] and attaches the bearer token.
/// - Opens real-time channels via [`DeepJsonClient::session_channel`].
///
/// ### Concurrency
/// Cloning is cheap; clones share the HTTP pool, the token and the pending
/// flags. Prefer the `*_with` methods and their option structs when several
/// tasks issue requests through the same client: the chained flag setters
/// apply to whichever call builds its request next.
///
/// ### Examples
/// ```no_run
/// # use deepjson::{DeepJsonClient, Result};
/// # async fn run() -> Result<()> {
/// let client = DeepJsonClient::new("https://db.example.com")?;
/// client.login("alice", "s3cret").await?;
/// client.post("settings/theme", "dark").await?;
/// let theme = client.get("settings/theme", "").await?.text().await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct DeepJsonClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) token: TokenStore,
    pub(crate) flags: Arc<Mutex<TransmissionFlags>>,
    pub(crate) storage: String,
    pub(crate) timeout: Duration,
}

impl DeepJsonClient {
    /// Creates a client for `base_url` with default settings.
    pub fn new(base_url: &str) -> Result<DeepJsonClient, BuildError> {
        Self::builder().base_url(base_url).build()
    }

    /// Returns a builder to edit settings before creating [`DeepJsonClient`].
    pub fn builder() -> DeepJsonClientBuilder {
        DeepJsonClientBuilder::default()
    }

    /// Creates a client from deserialized [`ConnectionConfig`].
    pub fn from_config(config: &ConnectionConfig) -> Result<DeepJsonClient, BuildError> {
        let mut builder = Self::builder();
        builder.base_url(config.base_url.as_str()).token(config.token.clone());
        if let Some(secs) = config.timeout_secs {
            builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(storage) = &config.storage {
            builder.storage(storage.as_str());
        }
        if let Some(extra) = &config.user_agent_extra {
            builder.user_agent_extra(extra.as_str());
        }
        builder.build()
    }

    // === Getters ===

    /// Server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Storage mode tag.
    pub fn storage(&self) -> &str {
        &self.storage
    }

    /// Configured HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// Shared token store (also used by session channels).
    pub fn token_store(&self) -> &TokenStore {
        &self.token
    }

    // === One-shot transmission flags ===

    fn with_flags<R>(&self, f: impl FnOnce(&mut TransmissionFlags) -> R) -> R {
        let mut guard = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Snapshot of the flags that the next CRUD call will consume.
    pub fn flags(&self) -> TransmissionFlags {
        self.with_flags(|flags| *flags)
    }

    /// Take the pending flags, leaving all of them cleared.
    pub(crate) fn take_flags(&self) -> TransmissionFlags {
        self.with_flags(std::mem::take)
    }

    /// Whether the next call requests binary transport.
    pub fn is_binary(&self) -> bool {
        self.flags().binary
    }

    /// Request binary transport for the next call.
    pub fn set_binary(&self, binary: bool) -> &Self {
        self.with_flags(|flags| flags.binary = binary);
        self
    }

    /// Whether the next `post` replaces an existing key.
    pub fn is_overwrite_key(&self) -> bool {
        self.flags().overwrite_key
    }

    /// Replace an existing key on the next `post`.
    pub fn set_overwrite_key(&self, overwrite_key: bool) -> &Self {
        self.with_flags(|flags| flags.overwrite_key = overwrite_key);
        self
    }

    /// Whether the next `get` travels as a POST with a body.
    pub fn has_get_body(&self) -> bool {
        self.flags().get_body
    }

    /// Send the next `get` as a POST with `X-Method-Override: GET`.
    pub fn set_get_body(&self, get_body: bool) -> &Self {
        self.with_flags(|flags| flags.get_body = get_body);
        self
    }
}
