// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure AD client-credentials tokens, cached per scope.

use crate::constants::TOKEN_EXPIRY_MARGIN_SECS;
use crate::errors::{ProviderError, ProviderResult};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Service principal used for every Azure call.
#[derive(Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Access tokens keyed by scope, refreshed shortly before they expire.
pub struct TokenCache {
    login_url: String,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into().trim_end_matches('/').to_string(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Token for `scope`, from the cache when still valid.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] when the token endpoint
    /// rejects the credentials, [`ProviderError::Connection`] when it cannot
    /// be reached.
    pub async fn token(
        &self,
        client: &HttpClient,
        credentials: &AzureCredentials,
        scope: &str,
    ) -> ProviderResult<String> {
        let mut tokens = self.tokens.lock().await;
        let now = Utc::now();
        if let Some(cached) = tokens.get(scope) {
            if cached.expires_at > now {
                return Ok(cached.token.clone());
            }
            debug!(scope = %scope, "Cached token expired, refreshing");
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.login_url, credentials.tenant_id);
        let response = client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ProviderError::Connection {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(ProviderError::Authentication {
                reason: format!("Token request for {scope} failed with HTTP {status}: {body}"),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        let expires_at = now + Duration::seconds(parsed.expires_in - TOKEN_EXPIRY_MARGIN_SECS);
        info!(scope = %scope, expires_at = %expires_at, "Obtained Azure access token");
        tokens.insert(
            scope.to_string(),
            CachedToken {
                token: parsed.access_token.clone(),
                expires_at,
            },
        );
        Ok(parsed.access_token)
    }
}
