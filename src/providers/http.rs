// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! JSON-over-HTTP plumbing shared by the REST provider clients.
//!
//! Every call goes through [`retry_provider_call`], so transient failures are
//! retried before surfacing as [`ProviderError`].

use super::retry::{retry_provider_call, status_error};
use crate::errors::{ProviderError, ProviderResult};
use crate::resources::Lookup;
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

/// Thin wrapper over a shared [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct JsonApi {
    client: HttpClient,
}

impl JsonApi {
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Send a request and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] for non-success statuses and
    /// [`ProviderError::Connection`] when no response was received.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> ProviderResult<String> {
        let operation = format!("{method} {url}");
        retry_provider_call(
            || self.send_once(method.clone(), url, bearer, body),
            &operation,
        )
        .await
    }

    /// Send a request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// As [`Self::send`], plus [`ProviderError::InvalidResponse`] when the body
    /// does not decode into `T`.
    pub async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> ProviderResult<T> {
        let text = self.send(method, url, bearer, body).await?;
        parse_json(url, &text)
    }

    /// GET a resource, mapping "not found" to [`Lookup::NotFound`].
    ///
    /// # Errors
    ///
    /// Any failure other than "not found".
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> ProviderResult<Lookup<T>> {
        match self.json(Method::GET, url, bearer, None).await {
            Ok(value) => Ok(Lookup::Found(value)),
            Err(e) if e.is_not_found() => {
                debug!(url = %url, "Resource not found");
                Ok(Lookup::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> ProviderResult<String> {
        debug!(method = %method, url = %url, "HTTP API request");

        let mut request = self.client.request(method.clone(), url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ProviderError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            if status.as_u16() != 404 {
                error!(
                    method = %method,
                    url = %url,
                    status = %status,
                    error = %text,
                    "HTTP API request failed"
                );
            }
            return Err(status_error(method.as_str(), url, status, text));
        }

        debug!(
            method = %method,
            url = %url,
            status = %status,
            response_len = text.len(),
            "HTTP API request successful"
        );
        Ok(text)
    }
}

/// Decode a JSON body, attributing failures to `url`.
///
/// An empty body decodes as JSON `null`.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] when the body does not decode.
pub fn parse_json<T: DeserializeOwned>(url: &str, text: &str) -> ProviderResult<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| ProviderError::InvalidResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
