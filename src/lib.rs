// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # infractl - Declarative Azure and DigitalOcean manager
//!
//! infractl reads a desired-state document, compares it with what the cloud
//! providers report, and applies the create/update/delete operations needed
//! to make the two match. A second flow issues Let's Encrypt certificates
//! through DNS-01 challenges published in the managed zones.
//!
//! ## Overview
//!
//! - Azure resource groups, key vaults, App Service plans, MariaDB servers,
//!   storage accounts, web apps and DNS zones
//! - DigitalOcean DNS domains
//! - Layered DNS configurations (raw and computed entries, merge policies)
//! - Multi-pass convergence with a deferral hash to detect stalls
//! - Let's Encrypt issuance with idempotent secret storage
//!
//! ## Modules
//!
//! - [`config`] - Desired-state document and runtime settings
//! - [`context`] - Audit log and deferrals of one manage pass
//! - [`dns`] - DNS entries, the layered reconciler and `set_entry`
//! - [`resources`] - Managed resource types and their diffs
//! - [`providers`] - Capability traits and their Azure, DigitalOcean and
//!   in-memory implementations
//! - [`manage`] - Per-provider reconciliation, orchestration, export and
//!   public-IP sync
//! - [`letsencrypt`] - ACME client and the issuance state machine
//!
//! ## Example
//!
//! ```rust,no_run
//! use infractl::config::{ManageConfiguration, ManageSettings};
//! use infractl::manage::azure::AzureManageService;
//! use infractl::manage::orchestrator::ManageOrchestrator;
//! use infractl::providers::memory::InMemoryProvider;
//! use infractl::providers::AzureProviders;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ManageConfiguration::parse(
//!     r#"{ "azure": { "resourceGroups": [{ "name": "rg1", "regionId": "canadacentral" }] } }"#,
//!     false,
//! )?;
//! let provider = Arc::new(InMemoryProvider::new());
//! let azure = AzureManageService::new(AzureProviders::from_client(provider.clone()), provider);
//! let report = ManageOrchestrator::new(Some(azure), None, ManageSettings::immediate())
//!     .run(&config)
//!     .await;
//! for line in report.summary() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod dns;
pub mod errors;
pub mod letsencrypt;
pub mod manage;
pub mod providers;
pub mod resources;
