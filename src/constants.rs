// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for infractl.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Constants
// ============================================================================

/// TTL used when a record set has no entry to derive a minimum from (2 days)
pub const DEFAULT_DNS_TTL_SECS: u32 = 172_800;

/// TTL of generated entries (verification TXT, custom domain) when none is configured
pub const DEFAULT_GENERATED_TTL_SECS: u32 = 3600;

/// TTL of the DNS-01 challenge TXT record
pub const ACME_CHALLENGE_TTL_SECS: u32 = 60;

/// Label prefixed to a domain to publish the DNS-01 challenge
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// Label prefixed to a hostname to publish the Azure custom domain verification id
pub const AZURE_UID_LABEL: &str = "asuid";

/// Relative name used by providers for the zone apex
pub const ZONE_APEX: &str = "@";

/// Default recursive resolver used for propagation checks
pub const DEFAULT_DNS_RESOLVER: &str = "8.8.8.8:53";

// ============================================================================
// Manage Retry Constants
// ============================================================================

/// Delay before the next pass when the previous pass made progress
pub const MANAGE_PROGRESS_DELAY_SECS: u64 = 15;

/// Delay before the next pass when the previous pass made no progress
pub const MANAGE_STALL_DELAY_SECS: u64 = 30;

/// Consecutive no-progress passes before giving up
pub const MANAGE_MAX_STALLED_PASSES: u32 = 4;

// ============================================================================
// Let's Encrypt Constants
// ============================================================================

/// Let's Encrypt production directory
pub const LETSENCRYPT_PRODUCTION_DIRECTORY: &str =
    "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory
pub const LETSENCRYPT_STAGING_DIRECTORY: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Interval between DNS-01 TXT visibility checks
pub const DNS_PROPAGATION_POLL_SECS: u64 = 10;

/// Interval between challenge status checks
pub const CHALLENGE_POLL_SECS: u64 = 5;

/// Interval between order status checks after finalization
pub const ORDER_POLL_SECS: u64 = 10;

/// Order status checks before finalization is considered failed
pub const ORDER_POLL_ATTEMPTS: u32 = 6;

/// Certificates expiring later than this are not renewed (about one month)
pub const CERTIFICATE_RENEW_BEFORE_DAYS: i64 = 30;

/// RSA modulus size for the account and certificate keys
pub const RSA_KEY_BITS: u32 = 4096;

/// Bytes of entropy in a generated PFX password
pub const PFX_PASSWORD_BYTES: usize = 10;

/// Secret namespace holding the ACME account key
pub const ACCOUNT_SECRET_NAMESPACE: &str = "account";

/// Suffix appended to the certificate namespace for staging issuance
pub const STAGING_NAMESPACE_SUFFIX: &str = "-staging";

/// Secret names of a stored certificate bundle
pub const SECRET_ACCOUNT_PRIVATE_KEY: &str = "private-key";
pub const SECRET_CA_CERT: &str = "ca-cert";
pub const SECRET_CERT: &str = "cert";
pub const SECRET_PUBLIC_KEY: &str = "public-key";
pub const SECRET_PRIVATE_KEY: &str = "private-key";
pub const SECRET_PFX_PASSWORD: &str = "pfx-password";

// ============================================================================
// Azure Constants
// ============================================================================

/// Azure Resource Manager endpoint
pub const AZURE_MANAGEMENT_URL: &str = "https://management.azure.com";

/// Azure Active Directory token endpoint host
pub const AZURE_LOGIN_URL: &str = "https://login.microsoftonline.com";

/// Token scope for Azure Resource Manager
pub const AZURE_MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Token scope for the Key Vault data plane
pub const AZURE_KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Seconds shaved off a token's lifetime before it is refreshed
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

/// Lifetime of a cached storage account key
pub const STORAGE_KEY_CACHE_SECS: i64 = 3600;

pub const API_VERSION_RESOURCES: &str = "2021-04-01";
pub const API_VERSION_KEY_VAULT: &str = "2022-07-01";
pub const API_VERSION_KEY_VAULT_SECRETS: &str = "7.4";
pub const API_VERSION_WEB: &str = "2022-03-01";
pub const API_VERSION_STORAGE: &str = "2023-01-01";
pub const API_VERSION_MARIADB: &str = "2018-06-01";
pub const API_VERSION_DNS: &str = "2018-05-01";

// ============================================================================
// DigitalOcean Constants
// ============================================================================

/// DigitalOcean API endpoint
pub const DIGITALOCEAN_API_URL: &str = "https://api.digitalocean.com";

/// Records requested per page when listing a domain
pub const DIGITALOCEAN_PAGE_SIZE: u32 = 200;

// ============================================================================
// Misc
// ============================================================================

/// Service returning the caller's public IPv4 address as plain text
pub const PUBLIC_IP_URL: &str = "https://api.ipify.org";
