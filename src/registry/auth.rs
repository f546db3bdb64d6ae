//! OAuth 2.0 client-credentials bearer tokens

use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::RegistryError;

/// Refresh this long before the issuer's stated expiry
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Lifetime assumed when the issuer omits `expires_in`
const DEFAULT_LIFETIME: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Fetches and caches access tokens from an issuer endpoint
pub struct BearerTokenProvider {
    endpoint: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl BearerTokenProvider {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
        http: Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.filter(|s| !s.trim().is_empty()),
            http,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, fetching a new one when the cached one expired
    pub fn token(&self) -> Result<String, RegistryError> {
        let mut cached = self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch()?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn fetch(&self) -> Result<CachedToken, RegistryError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.as_str()));
        }

        tracing::debug!(endpoint = %self.endpoint, client_id = %self.client_id, "Requesting access token");

        let response = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .map_err(|e| self.error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(self.error(format!("status {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| self.error(format!("invalid token response: {}", e)))?;

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_SKEW),
        })
    }

    fn error(&self, message: String) -> RegistryError {
        RegistryError::Token {
            endpoint: self.endpoint.clone(),
            message,
        }
    }
}

impl std::fmt::Debug for BearerTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenProvider")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
