// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for infractl.
//!
//! This module provides specialized error types for:
//! - Cloud provider API calls (Azure Resource Manager, Key Vault, DigitalOcean)
//! - DNS record set application
//! - Declarative reconciliation (manage runs)
//! - ACME / Let's Encrypt certificate issuance
//!
//! Provider errors carry enough structure (HTTP status, URL) to decide whether
//! a failure means "absent", "retry later", or "abort".

use thiserror::Error;

/// Errors returned by provider clients.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status
    #[error("{method} {url} failed with HTTP {status}: {body}")]
    Http {
        /// HTTP method of the failed request
        method: String,
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body (usually a provider error document)
        body: String,
    },

    /// The request never produced a response (DNS failure, refused, timeout)
    #[error("Connection to {url} failed: {reason}")]
    Connection {
        /// Request URL
        url: String,
        /// Reason reported by the HTTP client
        reason: String,
    },

    /// Credentials were rejected or a token could not be obtained
    #[error("Authentication failed: {reason}")]
    Authentication {
        /// Reason for the failure
        reason: String,
    },

    /// The provider answered with a body that could not be interpreted
    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse {
        /// Request URL
        url: String,
        /// What was wrong with the body
        reason: String,
    },

    /// A DNS query could not be completed
    #[error("DNS lookup of {name} failed: {reason}")]
    Lookup {
        /// Queried name
        name: String,
        /// Reason for the failure
        reason: String,
    },

    /// The in-memory provider rejected an operation
    #[error("{0}")]
    Rejected(String),
}

impl ProviderError {
    /// Returns true if the provider reported that the resource does not exist:
    /// HTTP 404, or HTTP 400 whose error document carries a not-found code.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Http { status: 404, .. } => true,
            Self::Http {
                status: 400, body, ..
            } => error_code(body).is_some_and(|code| NOT_FOUND_CODES.contains(&code.as_str())),
            _ => false,
        }
    }

    /// Returns true if the error is transient and the call may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Connection { .. } => true,
            Self::Authentication { .. }
            | Self::InvalidResponse { .. }
            | Self::Lookup { .. }
            | Self::Rejected(_) => false,
        }
    }
}

/// ARM and Key Vault error codes meaning "absent".
const NOT_FOUND_CODES: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound", "SecretNotFound"];

/// `error.code` of an ARM / Key Vault error document.
fn error_code(body: &str) -> Option<String> {
    let document: serde_json::Value = serde_json::from_str(body).ok()?;
    document
        .pointer("/error/code")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Result alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors raised while writing record sets to a zone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// Entries passed to a single record set write do not share one name and type
    #[error("All entries of a record set must share '{name}' {record_type}; found '{found_name}' {found_type}")]
    MixedEntries {
        name: String,
        record_type: String,
        found_name: String,
        found_type: String,
    },

    /// A CNAME record set was given more than one value
    #[error("CNAME '{name}' must have exactly one value, got {count}")]
    MultipleCname { name: String, count: usize },

    /// The record data cannot be expressed by the provider
    #[error("Invalid record data for '{name}' {record_type}: {reason}")]
    InvalidRecordData {
        name: String,
        record_type: String,
        reason: String,
    },
}

/// Failure of a record set write: a precondition violation or a provider error.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors that abort a manage run.
#[derive(Error, Debug)]
pub enum ManageError {
    /// An existing resource differs from the desired state on a field that cannot be changed in place
    #[error("{resource_type} ({name}) has diverged from the configuration: {}", differences.join("; "))]
    Divergence {
        resource_type: String,
        name: String,
        differences: Vec<String>,
    },

    /// A field inherited from the single configured resource group could not be resolved
    #[error("{resource_type} ({name}) has no {field} and no single default is configured")]
    MissingDefault {
        resource_type: String,
        name: String,
        field: String,
    },

    /// A referenced resource does not exist and cannot be created from here
    #[error("{resource_type} ({name}) references missing {reference}")]
    MissingReference {
        resource_type: String,
        name: String,
        reference: String,
    },

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The configuration document could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that abort a Let's Encrypt issuance.
#[derive(Error, Debug)]
pub enum AcmeError {
    /// The ACME server returned a problem document
    #[error("ACME request to {url} failed ({problem_type}): {detail}")]
    Protocol {
        url: String,
        problem_type: String,
        detail: String,
    },

    /// The authorization offered no DNS-01 challenge
    #[error("No dns-01 challenge offered for {domain}; available: {}", available.join(", "))]
    MissingDnsChallenge {
        domain: String,
        available: Vec<String>,
    },

    /// The challenge was rejected by the ACME server
    #[error("Challenge for {domain} is invalid: {detail}")]
    ChallengeInvalid { domain: String, detail: String },

    /// The order was rejected by the ACME server
    #[error("Order for {domain} is invalid: {detail}")]
    OrderInvalid { domain: String, detail: String },

    /// The order did not become valid within the polling budget
    #[error("Order for {domain} not valid after {attempts} attempts (status {status})")]
    FinalizeTimeout {
        domain: String,
        attempts: u32,
        status: String,
    },

    /// The challenge TXT record never became visible
    #[error("TXT record {name} not visible after {waited_secs}s")]
    DnsWaitTimeout { name: String, waited_secs: u64 },

    /// The challenge record cannot be written to the given zone
    #[error("{name} is outside zone {zone}")]
    OutsideZone { name: String, zone: String },

    /// The issued certificate could not be assembled
    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Cryptography error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<ApplyError> for ManageError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Dns(e) => Self::Dns(e),
            ApplyError::Provider(e) => Self::Provider(e),
        }
    }
}

impl From<ApplyError> for AcmeError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Dns(e) => Self::Dns(e),
            ApplyError::Provider(e) => Self::Provider(e),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
