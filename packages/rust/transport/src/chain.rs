//! Composable HTTP send chain.
//!
//! A chain is built innermost-to-outermost at source-construction time:
//! [`ReqwestTransport`] (plain outbound HTTP), optionally wrapped by
//! [`AuthTransport`] (bearer token from a provider), optionally wrapped
//! by [`CachedTransport`] (GET-only response cache). Sources issue plain
//! requests through the outermost [`HttpSend`] and stay unaware of the
//! wrapping.

use std::sync::Arc;

use changelogd_shared::{ChangelogError, Result};

use crate::auth::TokenProvider;
use crate::cache::CacheBackend;

/// A single outbound request. Kept deliberately small: method, URL, and
/// extra headers; bodies are not needed by the content pipeline.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// A GET request with no extra headers.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header, builder style.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A buffered response: status plus body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The one capability every link in the chain implements.
#[async_trait::async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// Compose the chain for a source: base transport, then auth, then cache
/// outermost.
pub fn build_chain(
    client: reqwest::Client,
    token_provider: Option<Arc<dyn TokenProvider>>,
    cache: Option<Arc<dyn CacheBackend>>,
) -> Arc<dyn HttpSend> {
    let mut chain: Arc<dyn HttpSend> = Arc::new(ReqwestTransport::new(client));

    if let Some(provider) = token_provider {
        chain = Arc::new(AuthTransport::new(chain, provider));
    }
    if let Some(backend) = cache {
        chain = Arc::new(CachedTransport::new(chain, backend));
    }
    chain
}

// ---------------------------------------------------------------------------
// ReqwestTransport
// ---------------------------------------------------------------------------

/// Base transport over an injected `reqwest::Client`.
///
/// The client is a constructor parameter on purpose: tests substitute a
/// deterministic fake server, and no process-wide default client exists.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl HttpSend for ReqwestTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(req.method.clone(), &req.url);
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChangelogError::Upstream(format!("{}: {e}", req.url)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ChangelogError::Upstream(format!("{}: body read failed: {e}", req.url)))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// AuthTransport
// ---------------------------------------------------------------------------

/// Attaches `Authorization: Bearer <token>` from a [`TokenProvider`]
/// before delegating to the inner transport.
pub struct AuthTransport {
    inner: Arc<dyn HttpSend>,
    provider: Arc<dyn TokenProvider>,
}

impl AuthTransport {
    pub fn new(inner: Arc<dyn HttpSend>, provider: Arc<dyn TokenProvider>) -> Self {
        Self { inner, provider }
    }
}

#[async_trait::async_trait]
impl HttpSend for AuthTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let token = self.provider.token().await?;
        let req = req.header("Authorization", format!("Bearer {token}"));
        self.inner.send(req).await
    }
}

// ---------------------------------------------------------------------------
// CachedTransport
// ---------------------------------------------------------------------------

/// GET-only response cache over a pluggable backend.
///
/// Keys are `"{method} {url}"`. Only successful bodies are stored, and a
/// hit is replayed as a 200 with the stored body. This is a body cache,
/// not an RFC 7234 implementation; invalidation is whatever the backend
/// evicts.
pub struct CachedTransport {
    inner: Arc<dyn HttpSend>,
    backend: Arc<dyn CacheBackend>,
}

impl CachedTransport {
    pub fn new(inner: Arc<dyn HttpSend>, backend: Arc<dyn CacheBackend>) -> Self {
        Self { inner, backend }
    }

    fn cache_key(req: &HttpRequest) -> String {
        format!("{} {}", req.method, req.url)
    }
}

#[async_trait::async_trait]
impl HttpSend for CachedTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        if req.method != reqwest::Method::GET {
            return self.inner.send(req).await;
        }

        let key = Self::cache_key(&req);
        match self.backend.get(&key).await {
            Ok(Some(body)) => {
                tracing::debug!(url = %req.url, "response cache hit");
                return Ok(HttpResponse { status: 200, body });
            }
            Ok(None) => {}
            // A broken cache must not fail the request.
            Err(e) => tracing::warn!(url = %req.url, error = %e, "cache read failed"),
        }

        let response = self.inner.send(req).await?;
        if response.is_success() {
            if let Err(e) = self.backend.set(&key, &response.body).await {
                tracing::warn!(key = %key, error = %e, "cache write failed");
            }
        }
        Ok(response)
    }
}
