// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Live DNS queries.
//!
//! Used to resolve web app hostnames to A records and to poll for the
//! propagation of DNS-01 challenge TXT records.

use crate::errors::{ProviderError, ProviderResult};
use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_client::udp::UdpClientConnection;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::debug;

/// Resolves names through a recursive resolver.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// IPv4 addresses of `name`; empty when it does not resolve.
    async fn lookup_a(&self, name: &str) -> ProviderResult<Vec<String>>;

    /// TXT values of `name`, each value's strings concatenated; empty when none.
    async fn lookup_txt(&self, name: &str) -> ProviderResult<Vec<String>>;
}

/// [`DnsLookup`] over UDP with `hickory-client`.
#[derive(Debug, Clone, Copy)]
pub struct HickoryLookup {
    server: SocketAddr,
}

impl HickoryLookup {
    #[must_use]
    pub fn new(server: SocketAddr) -> Self {
        Self { server }
    }

    /// Parse a resolver address such as `8.8.8.8:53`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Lookup`] if the address is invalid.
    pub fn from_address(address: &str) -> ProviderResult<Self> {
        let server = address
            .parse::<SocketAddr>()
            .map_err(|e| ProviderError::Lookup {
                name: address.to_string(),
                reason: format!("Invalid resolver address: {e}"),
            })?;
        Ok(Self::new(server))
    }

    async fn query(&self, name: &str, record_type: RecordType) -> ProviderResult<Vec<Record>> {
        let server = self.server;
        let name_str = name.to_string();

        tokio::task::spawn_blocking(move || {
            let lookup_error = |reason: String| ProviderError::Lookup {
                name: name_str.clone(),
                reason,
            };

            let conn = UdpClientConnection::new(server)
                .map_err(|e| lookup_error(format!("Failed to create UDP connection: {e}")))?;
            let client = SyncClient::new(conn);

            let fqdn = Name::from_str(&name_str)
                .map_err(|e| lookup_error(format!("Invalid name: {e}")))?;

            let response = client
                .query(&fqdn, DNSClass::IN, record_type)
                .map_err(|e| lookup_error(format!("Query for {record_type} failed: {e}")))?;

            let records: Vec<Record> = response
                .answers()
                .iter()
                .filter(|r| r.record_type() == record_type)
                .cloned()
                .collect();
            Ok(records)
        })
        .await
        .map_err(|e| ProviderError::Lookup {
            name: name.to_string(),
            reason: format!("DNS query task failed: {e}"),
        })?
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup_a(&self, name: &str) -> ProviderResult<Vec<String>> {
        let records = self.query(name, RecordType::A).await?;
        let addresses: Vec<String> = records
            .iter()
            .filter_map(|r| match r.data() {
                Some(RData::A(ip)) => Some(ip.to_string()),
                _ => None,
            })
            .collect();
        debug!(name = %name, addresses = ?addresses, "Resolved A records");
        Ok(addresses)
    }

    async fn lookup_txt(&self, name: &str) -> ProviderResult<Vec<String>> {
        let records = self.query(name, RecordType::TXT).await?;
        let values: Vec<String> = records
            .iter()
            .filter_map(|r| match r.data() {
                Some(RData::TXT(txt)) => Some(
                    txt.txt_data()
                        .iter()
                        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                        .collect::<String>(),
                ),
                _ => None,
            })
            .collect();
        debug!(name = %name, values = values.len(), "Resolved TXT records");
        Ok(values)
    }
}

#[cfg(test)]
#[path = "lookup_tests.rs"]
mod lookup_tests;
