// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dns/lookup.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_from_address_accepts_ip_and_port() {
        let lookup = HickoryLookup::from_address("8.8.8.8:53").expect("valid address");
        assert_eq!(lookup.server, "8.8.8.8:53".parse::<SocketAddr>().expect("addr"));
    }

    #[test]
    fn test_from_address_rejects_hostname() {
        let err = HickoryLookup::from_address("dns.google").expect_err("not an ip:port");
        assert!(matches!(err, ProviderError::Lookup { .. }));
    }

    #[test]
    fn test_from_address_requires_port() {
        assert!(HickoryLookup::from_address("1.1.1.1").is_err());
    }
}
