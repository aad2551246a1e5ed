// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-pass context of a manage run.
//!
//! A [`ManageContext`] is created fresh for every pass. It collects:
//! - the audit trail of modifications applied during the pass
//! - the deferrals raised by dependencies that could not be resolved yet
//!
//! The deferrals are folded into a "needs next stage" hash. An empty hash means
//! the pass converged; comparing the hashes of two consecutive passes tells the
//! orchestrator whether the retry made progress.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::info;

/// What a modification did to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationAction {
    Add,
    Update,
    Remove,
}

impl fmt::Display for ModificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Remove => "REMOVE",
        })
    }
}

/// One entry of the audit trail.
///
/// Rendered as `<ResourceType> (<name>) <ADD|UPDATE|REMOVE> <details>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub resource_type: String,
    pub name: String,
    pub action: ModificationAction,
    pub details: String,
}

impl Modification {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        action: ModificationAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            action,
            details: details.into(),
        }
    }
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.resource_type, self.name, self.action)?;
        if !self.details.is_empty() {
            write!(f, " {}", self.details)?;
        }
        Ok(())
    }
}

/// Why a computed value could not be produced during this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeferralKind {
    /// The referenced web app does not exist (yet)
    WebAppNotFound,
    /// The web app exists but its verification id is not readable yet
    WebAppVerificationId,
    /// The web app exists but exposes no default hostname yet
    WebAppDefaultHostname,
    /// A hostname does not resolve to any address yet
    HostnameResolution,
    /// A custom hostname could not be bound to a web app
    HostnameBinding,
}

/// A dependency that was not available, identified by kind and resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deferral {
    pub kind: DeferralKind,
    pub resource: String,
}

/// Accumulates the outcome of one manage pass.
#[derive(Debug, Default)]
pub struct ManageContext {
    modifications: Vec<Modification>,
    deferrals: Vec<Deferral>,
}

impl ManageContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a modification in the audit trail.
    pub fn add_modification(&mut self, modification: Modification) {
        info!("{modification}");
        self.modifications.push(modification);
    }

    /// Shorthand for [`Self::add_modification`].
    pub fn modified(
        &mut self,
        resource_type: &str,
        name: &str,
        action: ModificationAction,
        details: impl Into<String>,
    ) {
        self.add_modification(Modification::new(resource_type, name, action, details));
    }

    /// Signal that `resource` is needed by a later pass.
    pub fn needs_next_stage(&mut self, kind: DeferralKind, resource: impl Into<String>) {
        let resource = resource.into();
        info!(kind = ?kind, resource = %resource, "Dependency not available yet, deferring to next pass");
        self.deferrals.push(Deferral { kind, resource });
    }

    #[must_use]
    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    #[must_use]
    pub fn deferrals(&self) -> &[Deferral] {
        &self.deferrals
    }

    /// Consume the context, returning the audit trail.
    #[must_use]
    pub fn into_modifications(self) -> Vec<Modification> {
        self.modifications
    }

    /// Order-sensitive hash of the deferrals raised so far.
    ///
    /// Empty when nothing was deferred. Otherwise the SHA-256 of the JSON
    /// serialization of the deferral list, so two passes deferring the same
    /// dependencies in the same order produce the same hash.
    #[must_use]
    pub fn needs_next_stage_hash(&self) -> String {
        if self.deferrals.is_empty() {
            return String::new();
        }
        let json = serde_json::to_string(&self.deferrals).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
