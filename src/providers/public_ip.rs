// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Public IP discovery through a plain-text "what is my IP" service.

use super::http::JsonApi;
use super::PublicIpSource;
use crate::constants::PUBLIC_IP_URL;
use crate::errors::{ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::Method;
use std::net::IpAddr;
use tracing::debug;

#[derive(Clone)]
pub struct HttpPublicIp {
    api: JsonApi,
    url: String,
}

impl HttpPublicIp {
    pub fn new(api: JsonApi) -> Self {
        Self {
            api,
            url: PUBLIC_IP_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl PublicIpSource for HttpPublicIp {
    async fn get_public_ip(&self) -> ProviderResult<String> {
        let body = self.api.send(Method::GET, &self.url, None, None).await?;
        let ip = body.trim();
        ip.parse::<IpAddr>()
            .map_err(|e| ProviderError::InvalidResponse {
                url: self.url.clone(),
                reason: format!("'{ip}' is not an IP address: {e}"),
            })?;
        debug!(ip = %ip, "Discovered public IP");
        Ok(ip.to_string())
    }
}

#[cfg(test)]
#[path = "public_ip_tests.rs"]
mod public_ip_tests;
