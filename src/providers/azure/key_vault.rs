// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key Vault secrets as a [`SecretStore`].
//!
//! Secret names only allow alphanumerics and dashes, so the namespace and the
//! name are joined with a dash and every other character is replaced.

use super::AzureSession;
use crate::constants::{API_VERSION_KEY_VAULT_SECRETS, AZURE_KEY_VAULT_SCOPE};
use crate::errors::ProviderResult;
use crate::providers::SecretStore;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

/// Secrets of one key vault.
pub struct AzureSecretStore {
    session: Arc<AzureSession>,
    vault: String,
}

impl AzureSecretStore {
    pub fn new(session: Arc<AzureSession>, vault: impl Into<String>) -> Self {
        Self {
            session,
            vault: vault.into(),
        }
    }

    fn secret_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/secrets/{}?api-version={API_VERSION_KEY_VAULT_SECRETS}",
            self.session.key_vault_url(&self.vault),
            secret_name(namespace, name)
        )
    }
}

/// Key Vault secret name of `name` in `namespace`.
#[must_use]
pub fn secret_name(namespace: &str, name: &str) -> String {
    format!("{namespace}-{name}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[async_trait]
impl SecretStore for AzureSecretStore {
    async fn get_text(&self, namespace: &str, name: &str) -> ProviderResult<Option<String>> {
        let token = self.session.token(AZURE_KEY_VAULT_SCOPE).await?;
        let url = self.secret_url(namespace, name);
        let found = self
            .session
            .api()
            .get_optional::<SecretBundle>(&url, Some(&token))
            .await?;
        Ok(found.into_option().and_then(|bundle| bundle.value))
    }

    async fn set_text_or_fail(&self, namespace: &str, name: &str, value: &str) -> ProviderResult<()> {
        let token = self.session.token(AZURE_KEY_VAULT_SCOPE).await?;
        let url = self.secret_url(namespace, name);
        let body = json!({ "value": value });
        self.session
            .api()
            .send(Method::PUT, &url, Some(&token), Some(&body))
            .await?;
        debug!(vault = %self.vault, namespace = %namespace, name = %name, "Stored secret");
        Ok(())
    }
}

#[cfg(test)]
#[path = "key_vault_tests.rs"]
mod key_vault_tests;
