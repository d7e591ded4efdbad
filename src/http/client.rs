//! Client facade.
//!
//! # Responsibilities
//! - Capture client options once, at construction
//! - Wire the breaker registry, token manager and transport together
//! - Expose one method per HTTP verb over the shared request pipeline
//!
//! # Design Decisions
//! - `Client` is a cheap `Arc` handle; clones share everything
//! - Clients built separately only share a registry or token cache when
//!   one is passed to each builder

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;

use crate::auth::{OAuthTokenSource, TokenManager, TokenSource};
use crate::config::schema::GalfConfig;
use crate::config::watcher::apply_circuit_breakers;
use crate::error::{Error, Result};
use crate::http::request::{Body, RequestOptions};
use crate::http::response::Response;
use crate::http::transport::{ReqwestTransport, Transport};
use crate::resilience::retries::DEFAULT_RETRYABLE_STATUSES;
use crate::resilience::{Backoff, BreakerRegistry};

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("galf/", env!("CARGO_PKG_VERSION"));

/// Client-wide behavior, immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Transport timeout of one attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Log request and response summaries at debug level.
    pub show_debug: bool,
    /// Breaker command every call runs under. `None` calls the transport directly.
    pub circuit_breaker: Option<String>,
    pub content_type: String,
    pub retryable_statuses: Vec<u16>,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff: Backoff::default(),
            show_debug: false,
            circuit_breaker: None,
            content_type: "application/json".to_string(),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientOptions {
    pub fn new(
        timeout: Duration,
        show_debug: bool,
        max_retries: u32,
        circuit_breaker: Option<String>,
    ) -> Self {
        Self {
            timeout,
            show_debug,
            max_retries,
            circuit_breaker,
            ..Self::default()
        }
    }
}

pub(crate) struct ClientInner {
    pub(crate) options: ClientOptions,
    pub(crate) registry: Arc<BreakerRegistry>,
    pub(crate) tokens: Option<TokenManager>,
    pub(crate) transport: Arc<dyn Transport>,
}

/// Resilient HTTP client.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("registry", &self.inner.registry)
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client with its own empty breaker registry, no token source and the
    /// default transport.
    ///
    /// A named `circuit_breaker` is rejected with [`Error::ConfigNotFound`]
    /// here; pass the registry holding it through [`Client::builder`].
    pub fn new(options: ClientOptions) -> Result<Self> {
        Self::builder(options).build()
    }

    pub fn builder(options: ClientOptions) -> ClientBuilder {
        ClientBuilder::new(options)
    }

    /// Build a client from a loaded configuration.
    ///
    /// Every breaker command in `config` is registered into `registry`, and
    /// an OAuth token source is installed when `config.auth` is set.
    pub fn from_config(config: &GalfConfig, registry: Arc<BreakerRegistry>) -> Result<Self> {
        apply_circuit_breakers(&registry, config);
        let mut builder = Self::builder(config.client.to_options()).registry(registry);
        if let Some(auth) = &config.auth {
            let source = OAuthTokenSource::new(auth.to_settings()?)?;
            builder = builder.token_source(Arc::new(source));
        }
        builder.build()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.inner.registry
    }

    pub fn token_manager(&self) -> Option<&TokenManager> {
        self.inner.tokens.as_ref()
    }

    pub async fn get(&self, url: &str, options: Option<&RequestOptions>) -> Result<Response> {
        self.request(Method::GET, url, Body::Empty, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: Option<&RequestOptions>,
    ) -> Result<Response> {
        self.request(Method::POST, url, body.into(), options).await
    }

    pub async fn put(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: Option<&RequestOptions>,
    ) -> Result<Response> {
        self.request(Method::PUT, url, body.into(), options).await
    }

    pub async fn delete(&self, url: &str, options: Option<&RequestOptions>) -> Result<Response> {
        self.request(Method::DELETE, url, Body::Empty, options).await
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    options: ClientOptions,
    registry: Option<Arc<BreakerRegistry>>,
    tokens: Option<TokenManager>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            registry: None,
            tokens: None,
            transport: None,
        }
    }

    /// Registry the client looks its breaker up in.
    pub fn registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Authenticate every call with tokens from `source`.
    pub fn token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(TokenManager::new(source));
        self
    }

    /// Share an existing token cache.
    pub fn token_manager(mut self, manager: TokenManager) -> Self {
        self.tokens = Some(manager);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Fails with [`Error::ConfigNotFound`] when a breaker is named but no
    /// registry was given, since a fresh registry cannot hold it.
    pub fn build(self) -> Result<Client> {
        if let (Some(name), None) = (&self.options.circuit_breaker, &self.registry) {
            return Err(Error::ConfigNotFound(name.clone()));
        }
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        tracing::debug!(
            timeout_ms = self.options.timeout.as_millis() as u64,
            max_retries = self.options.max_retries,
            circuit_breaker = ?self.options.circuit_breaker,
            authenticated = self.tokens.is_some(),
            "Client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                options: self.options,
                registry: self.registry.unwrap_or_default(),
                tokens: self.tokens,
                transport,
            }),
        })
    }
}
