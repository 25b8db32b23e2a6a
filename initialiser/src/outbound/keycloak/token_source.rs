//! Keycloak client-credentials token source.
//!
//! Tokens are cached until shortly before they expire. Callers that see a
//! token rejected invalidate the cache so the next request fetches a new one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::ports::define_port_error;
use crate::outbound::http_body::body_preview;

const GRACE_PERIOD_SECONDS: i64 = 30;

define_port_error! {
    /// Errors raised while obtaining an access token.
    pub enum TokenError {
        /// The token endpoint URL could not be built.
        Configuration { message: String } =>
            "token source misconfigured: {message}",
        /// The token request never produced a response.
        Request { message: String } =>
            "token request failed: {message}",
        /// Keycloak refused the credentials.
        Rejected { message: String } =>
            "token request rejected: {message}",
        /// The token response was not understood.
        Decode { message: String } =>
            "token response decode failed: {message}",
    }
}

/// Supplies bearer tokens to outbound adapters.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Return a token that is valid for at least the grace period.
    async fn access_token(&self) -> Result<String, TokenError>;

    /// Drop any cached token.
    async fn invalidate(&self);
}

/// Client credentials for one Keycloak realm.
#[derive(Debug, Clone)]
pub struct KeycloakCredentials {
    /// Keycloak base URL, including any path prefix such as `/auth`.
    pub auth_server: Url,
    /// Realm holding the client.
    pub realm: String,
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: Zeroizing<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponseDto {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(GRACE_PERIOD_SECONDS) < self.expires_at
    }
}

/// Token source performing the OAuth2 client-credentials grant.
pub struct KeycloakTokenSource {
    client: Client,
    token_url: Url,
    client_id: String,
    client_secret: Zeroizing<String>,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<CachedToken>>,
}

impl KeycloakTokenSource {
    /// Build a token source for `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] when the token URL cannot be
    /// derived or the HTTP client cannot be constructed.
    pub fn new(
        credentials: KeycloakCredentials,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let token_url = token_url(&credentials.auth_server, &credentials.realm)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TokenError::configuration(error.to_string()))?;
        Ok(Self {
            client,
            token_url,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            clock,
            cached: RwLock::new(None),
        })
    }

    /// The endpoint tokens are requested from.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    async fn request_token(&self) -> Result<CachedToken, TokenError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|error| TokenError::request(error.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| TokenError::request(error.to_string()))?;
        if !status.is_success() {
            return Err(TokenError::rejected(format!(
                "status {}: {}",
                status.as_u16(),
                body_preview(body.as_ref())
            )));
        }

        let decoded: TokenResponseDto = serde_json::from_slice(body.as_ref())
            .map_err(|error| TokenError::decode(error.to_string()))?;
        let expires_at = expiry(self.clock.utc(), decoded.expires_in)?;
        debug!(expires_at = %expires_at, "acquired access token");
        Ok(CachedToken {
            access_token: decoded.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl AccessTokenProvider for KeycloakTokenSource {
    async fn access_token(&self) -> Result<String, TokenError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(self.clock.utc())) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(self.clock.utc())) {
            return Ok(token.access_token.clone());
        }
        debug!(token_url = %self.token_url, "refreshing access token");
        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

/// `now` plus the advertised lifetime; negative lifetimes count as expired.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, TokenError> {
    TimeDelta::try_seconds(expires_in.max(0))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| TokenError::decode(format!("expires_in {expires_in} is out of range")))
}

fn token_url(auth_server: &Url, realm: &str) -> Result<Url, TokenError> {
    if realm.is_empty() || realm.contains('/') {
        return Err(TokenError::configuration(format!("invalid realm `{realm}`")));
    }
    let base = auth_server.as_str().trim_end_matches('/');
    Url::parse(&format!(
        "{base}/realms/{realm}/protocol/openid-connect/token"
    ))
    .map_err(|error| TokenError::configuration(error.to_string()))
}
