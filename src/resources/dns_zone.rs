// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS zone (Azure DNS zone or DigitalOcean domain).
//!
//! The zone handle identifies where record sets are written. Its records are
//! not part of [`DnsZone::differences`]; they are reconciled by
//! [`crate::dns::reconciler`].

use super::{immutable_field, CloudProvider, Difference, ManagedResource, NoUpdate};
use crate::dns::reconciler::DnsConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsZone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    /// Domain name of the zone (e.g. `example.com`)
    pub name: String,
    /// Azure only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub config: DnsConfig,
}

impl DnsZone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            provider: None,
            name: name.into(),
            resource_group: None,
            config: DnsConfig::default(),
        }
    }

    #[must_use]
    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<NoUpdate>> {
        let mut diffs = Vec::new();
        immutable_field(
            &mut diffs,
            "resourceGroup",
            self.resource_group.as_deref(),
            current.resource_group.as_deref(),
        );
        diffs
    }
}

impl ManagedResource for DnsZone {
    const RESOURCE_TYPE: &'static str = "DnsZone";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
    }
}
