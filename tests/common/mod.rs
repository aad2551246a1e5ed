// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use infractl::config::{ManageConfiguration, ManageSettings};
use infractl::manage::azure::AzureManageService;
use infractl::manage::digitalocean::DigitalOceanManageService;
use infractl::manage::orchestrator::ManageOrchestrator;
use infractl::providers::memory::InMemoryProvider;
use infractl::providers::AzureProviders;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Orchestrator running both services against one in-memory provider, without sleeps.
pub fn memory_orchestrator(provider: &InMemoryProvider) -> ManageOrchestrator {
    let azure = AzureManageService::new(
        AzureProviders::from_client(Arc::new(provider.clone())),
        Arc::new(provider.clone()),
    );
    let digital_ocean = DigitalOceanManageService::new(
        Arc::new(provider.clone()),
        Some(Arc::new(provider.clone())),
        Arc::new(provider.clone()),
    );
    ManageOrchestrator::new(Some(azure), Some(digital_ocean), ManageSettings::immediate())
}

/// Write `text` to a temporary file with the given suffix and load it.
pub fn load_config(text: &str, suffix: &str) -> (NamedTempFile, ManageConfiguration) {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(text.as_bytes()).expect("write config");
    let config = ManageConfiguration::load(file.path()).expect("load config");
    (file, config)
}
