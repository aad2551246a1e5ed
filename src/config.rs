// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state document and runtime settings.
//!
//! The [`ManageConfiguration`] document is JSON, or YAML when the file name
//! ends in `.yaml`/`.yml`. Keys are camelCase.
//!
//! # Example
//!
//! ```json
//! {
//!   "azure": {
//!     "resourceGroups": [{ "name": "rg-prod", "regionId": "canadacentral" }],
//!     "dnsZones": [{
//!       "name": "example.com",
//!       "config": {
//!         "configs": [{
//!           "conflictResolution": "OVERWRITE",
//!           "rawDnsEntries": [
//!             { "name": "www.example.com", "type": "A", "details": "1.2.3.4", "ttl": 300 }
//!           ]
//!         }]
//!       }
//!     }]
//!   }
//! }
//! ```

use crate::constants::{
    CERTIFICATE_RENEW_BEFORE_DAYS, CHALLENGE_POLL_SECS, DNS_PROPAGATION_POLL_SECS,
    MANAGE_MAX_STALLED_PASSES, MANAGE_PROGRESS_DELAY_SECS, MANAGE_STALL_DELAY_SECS,
    ORDER_POLL_ATTEMPTS, ORDER_POLL_SECS, RSA_KEY_BITS,
};
use crate::errors::ManageError;
use crate::resources::{
    ApplicationServicePlan, DnsZone, KeyVault, Mariadb, ResourceGroup, StorageAccount, WebApp,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Root of the desired-state document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_ocean: Option<DigitalOceanConfiguration>,
}

/// Azure resources, reconciled in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_groups: Vec<ResourceGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_vaults: Vec<KeyVault>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub application_service_plans: Vec<ApplicationServicePlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mariadbs: Vec<Mariadb>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_zones: Vec<DnsZone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_accounts: Vec<StorageAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_apps: Vec<WebApp>,
}

impl AzureConfiguration {
    /// The resource group every resource defaults to, when exactly one is configured.
    #[must_use]
    pub fn default_resource_group(&self) -> Option<&ResourceGroup> {
        match self.resource_groups.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalOceanConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<DnsZone>,
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

impl ManageConfiguration {
    /// Parse a document from text; `yaml` selects the format.
    ///
    /// # Errors
    ///
    /// Returns [`ManageError::Config`] when the text does not match the schema.
    pub fn parse(text: &str, yaml: bool) -> Result<Self, ManageError> {
        if yaml {
            serde_yaml::from_str(text).map_err(|e| ManageError::Config(e.to_string()))
        } else {
            serde_json::from_str(text).map_err(|e| ManageError::Config(e.to_string()))
        }
    }

    /// Load a document, choosing the format by file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ManageError::Config`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ManageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ManageError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded configuration");
        Self::parse(&text, is_yaml(path))
            .map_err(|e| ManageError::Config(format!("{}: {e}", path.display())))
    }

    /// Render the document as YAML, or pretty JSON when `yaml` is false.
    ///
    /// # Errors
    ///
    /// Returns [`ManageError::Config`] when serialization fails.
    pub fn render(&self, yaml: bool) -> Result<String, ManageError> {
        if yaml {
            serde_yaml::to_string(self).map_err(|e| ManageError::Config(e.to_string()))
        } else {
            serde_json::to_string_pretty(self).map_err(|e| ManageError::Config(e.to_string()))
        }
    }

    /// Write the document, choosing the format by file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ManageError::Config`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ManageError> {
        let text = self.render(is_yaml(path))?;
        std::fs::write(path, text)
            .map_err(|e| ManageError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }
}

/// Timing of the manage retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageSettings {
    /// Sleep before the next pass when the previous one made progress
    pub progress_delay: Duration,
    /// Sleep before the next pass when the previous one made no progress
    pub stall_delay: Duration,
    /// Consecutive no-progress passes before the run is declared stalled
    pub max_stalled_passes: u32,
}

impl Default for ManageSettings {
    fn default() -> Self {
        Self {
            progress_delay: Duration::from_secs(MANAGE_PROGRESS_DELAY_SECS),
            stall_delay: Duration::from_secs(MANAGE_STALL_DELAY_SECS),
            max_stalled_passes: MANAGE_MAX_STALLED_PASSES,
        }
    }
}

impl ManageSettings {
    /// Settings without any sleep, for tests and dry runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            progress_delay: Duration::ZERO,
            stall_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Timing of a Let's Encrypt issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetsEncryptSettings {
    pub dns_poll_interval: Duration,
    /// Upper bound of the TXT visibility wait; `None` waits forever
    pub dns_max_wait: Option<Duration>,
    pub challenge_poll_interval: Duration,
    pub order_poll_interval: Duration,
    pub order_poll_attempts: u32,
    /// Existing certificates expiring later than this are kept
    pub renew_before: chrono::Duration,
    /// Size of generated account and certificate keys
    pub key_bits: u32,
}

impl Default for LetsEncryptSettings {
    fn default() -> Self {
        Self {
            dns_poll_interval: Duration::from_secs(DNS_PROPAGATION_POLL_SECS),
            dns_max_wait: None,
            challenge_poll_interval: Duration::from_secs(CHALLENGE_POLL_SECS),
            order_poll_interval: Duration::from_secs(ORDER_POLL_SECS),
            order_poll_attempts: ORDER_POLL_ATTEMPTS,
            renew_before: chrono::Duration::days(CERTIFICATE_RENEW_BEFORE_DAYS),
            key_bits: RSA_KEY_BITS,
        }
    }
}

impl LetsEncryptSettings {
    /// Settings without any sleep and with smaller keys, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            dns_poll_interval: Duration::ZERO,
            challenge_poll_interval: Duration::ZERO,
            order_poll_interval: Duration::ZERO,
            key_bits: 2048,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
