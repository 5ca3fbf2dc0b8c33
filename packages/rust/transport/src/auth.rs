//! Token providers for the auth transport.
//!
//! Two schemes: a static access token taken straight from config, and
//! GitHub App installation auth, which signs a short-lived RS256 app JWT
//! and exchanges it for an installation token. Exchange happens lazily
//! on first use and the token is cached until shortly before expiry.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use changelogd_shared::{ChangelogError, Result};

/// Seconds of validity left below which a cached token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime of the signed app JWT (GitHub allows at most 10 minutes).
const APP_JWT_LIFETIME_SECS: i64 = 540;

/// Supplies the bearer token the auth transport attaches to requests.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// StaticToken
// ---------------------------------------------------------------------------

/// A fixed access token from configuration.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

// ---------------------------------------------------------------------------
// InstallationTokenProvider
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenExchangeResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct AppJwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Exchanges a GitHub App identity for short-lived installation tokens.
///
/// Safe under concurrent use: the cache mutex is held across the
/// exchange, so concurrent first-use dedups to a single token request.
pub struct InstallationTokenProvider {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
    api_base: String,
    client: reqwest::Client,
    cached: tokio::sync::Mutex<Option<CachedToken>>,
}

impl InstallationTokenProvider {
    /// Load the app private key and build the provider.
    ///
    /// Fails fast on a missing, empty, or non-RSA key, before any
    /// network call is made.
    pub fn new(
        app_id: u64,
        installation_id: u64,
        private_key_path: &Path,
        client: reqwest::Client,
    ) -> Result<Self> {
        let pem = std::fs::read_to_string(private_key_path).map_err(|e| {
            ChangelogError::auth(format!(
                "failed to read github app private key {}: {e}",
                private_key_path.display()
            ))
        })?;
        if pem.trim().is_empty() {
            return Err(ChangelogError::auth("github app private key is empty"));
        }

        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| ChangelogError::auth(format!("invalid github app private key: {e}")))?;

        Ok(Self {
            app_id,
            installation_id,
            key,
            api_base: "https://api.github.com".to_string(),
            client,
            cached: tokio::sync::Mutex::new(None),
        })
    }

    /// Override the API base URL (tests point this at a mock server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn sign_app_jwt(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AppJwtClaims {
            // Backdated to tolerate clock skew against the API.
            iat: now - 60,
            exp: now + APP_JWT_LIFETIME_SECS,
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ChangelogError::auth(format!("failed to sign app jwt: {e}")))
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let jwt = self.sign_app_jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, self.installation_id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {jwt}"))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ChangelogError::Upstream(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChangelogError::Upstream(format!(
                "token exchange failed: {url}: HTTP {status}"
            )));
        }

        let body: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| ChangelogError::Upstream(format!("{url}: invalid token response: {e}")))?;

        tracing::debug!(
            installation_id = self.installation_id,
            expires_at = %body.expires_at,
            "exchanged installation token"
        );

        Ok(CachedToken {
            token: body.token,
            expires_at: body.expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for InstallationTokenProvider {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(existing) = cached.as_ref() {
            if existing.expires_at - Utc::now() > Duration::seconds(REFRESH_MARGIN_SECS) {
                return Ok(existing.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
