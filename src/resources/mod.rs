// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed cloud resources and their comparison against desired state.
//!
//! Each resource kind owns a pure `differences(&self, current)` function returning
//! a list of [`Difference`] values:
//!
//! - [`Difference::Blocking`] - an immutable field differs; the manage run aborts
//! - [`Difference::Deferred`] - a field can be changed in place; the caller applies
//!   the carried update through the provider and records the modification
//!
//! Nothing in this module talks to a provider.

pub mod app_service_plan;
pub mod dns_zone;
pub mod key_vault;
pub mod list_diff;
pub mod mariadb;
pub mod resource_group;
pub mod storage_account;
pub mod web_app;

pub use app_service_plan::{ApplicationServicePlan, PlanOs, PlanUpdate};
pub use dns_zone::DnsZone;
pub use key_vault::KeyVault;
pub use list_diff::{compare_lists, ListChange};
pub use mariadb::{Mariadb, MariadbUpdate};
pub use resource_group::ResourceGroup;
pub use storage_account::{FileShare, StorageAccount, StorageAccountUpdate};
pub use web_app::{WebApp, WebAppMountStorage, WebAppUpdate};

use crate::errors::ManageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Cloud that owns a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudProvider {
    Azure,
    DigitalOcean,
    InMemory,
}

/// Outcome of a lookup by name. Provider failures travel separately as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Lookup<R> {
        match self {
            Self::Found(value) => Lookup::Found(f(value)),
            Self::NotFound => Lookup::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

/// Update type of resources without any field changeable in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoUpdate {}

impl fmt::Display for NoUpdate {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

/// One difference between a desired and a current resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference<U> {
    /// An immutable field differs
    Blocking {
        field: String,
        desired: String,
        current: String,
    },
    /// A field differs and can be updated in place
    Deferred(U),
}

impl<U: fmt::Display> fmt::Display for Difference<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking {
                field,
                desired,
                current,
            } => write!(f, "{field}: desired {desired}, current {current}"),
            Self::Deferred(update) => update.fmt(f),
        }
    }
}

/// Common surface of every managed resource.
pub trait ManagedResource {
    /// Resource type used in modification logs (e.g. `WebApp`)
    const RESOURCE_TYPE: &'static str;

    fn name(&self) -> &str;

    /// Drop provider-assigned identity and live-only fields before export.
    fn strip_provider_fields(&mut self);
}

/// Push a blocking difference if `desired` is set and differs from `current`.
pub(crate) fn immutable_field<U>(
    diffs: &mut Vec<Difference<U>>,
    field: &str,
    desired: Option<&str>,
    current: Option<&str>,
) {
    if let Some(desired) = desired {
        let current_value = current.unwrap_or("");
        if !same_identifier(desired, current_value) {
            diffs.push(Difference::Blocking {
                field: field.to_string(),
                desired: desired.to_string(),
                current: current_value.to_string(),
            });
        }
    }
}

/// Azure identifiers (regions, resource groups) compare case-insensitively, ignoring spaces.
#[must_use]
pub fn same_identifier(a: &str, b: &str) -> bool {
    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    normalize(a) == normalize(b)
}

/// Split differences into the in-place updates to apply.
///
/// Every blocking difference is logged; if there is at least one, the resource
/// has diverged and the whole run is aborted.
///
/// # Errors
///
/// Returns [`ManageError::Divergence`] listing every blocking difference.
pub fn deferred_updates<U: fmt::Display>(
    resource_type: &str,
    name: &str,
    diffs: Vec<Difference<U>>,
) -> Result<Vec<U>, ManageError> {
    let mut blocking = Vec::new();
    let mut updates = Vec::new();
    for diff in diffs {
        match diff {
            Difference::Blocking { .. } => {
                let description = diff.to_string();
                error!(
                    resource_type = resource_type,
                    name = name,
                    difference = %description,
                    "Resource differs on a field that cannot be updated"
                );
                blocking.push(description);
            }
            Difference::Deferred(update) => updates.push(update),
        }
    }

    if blocking.is_empty() {
        Ok(updates)
    } else {
        Err(ManageError::Divergence {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            differences: blocking,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
