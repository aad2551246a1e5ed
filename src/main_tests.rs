// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command line parsing and credentials

#[cfg(test)]
mod tests {
    use super::super::*;

    fn azure_args(
        tenant_id: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<&str>,
        subscription_id: Option<&str>,
    ) -> AzureArgs {
        AzureArgs {
            azure_tenant_id: tenant_id.map(str::to_string),
            azure_client_id: client_id.map(str::to_string),
            azure_client_secret: client_secret.map(str::to_string),
            azure_subscription_id: subscription_id.map(str::to_string),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_manage_with_overrides() {
        let cli = Cli::try_parse_from([
            "infractl",
            "manage",
            "--config",
            "infra.yaml",
            "--progress-delay-secs",
            "0",
            "--max-stalled-passes",
            "2",
        ])
        .expect("parse");
        match cli.command {
            Command::Manage {
                config,
                progress_delay_secs,
                stall_delay_secs,
                max_stalled_passes,
            } => {
                assert_eq!(config, PathBuf::from("infra.yaml"));
                assert_eq!(progress_delay_secs, Some(0));
                assert_eq!(stall_delay_secs, None);
                assert_eq!(max_stalled_passes, Some(2));
            }
            other => panic!("expected manage, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_letsencrypt() {
        let cli = Cli::try_parse_from([
            "infractl",
            "letsencrypt",
            "--domain",
            "www.example.com",
            "--dns-provider",
            "digitalocean",
            "--zone",
            "example.com",
            "--key-vault",
            "kv1",
            "--email",
            "ops@example.com",
            "--staging",
        ])
        .expect("parse");
        let Command::Letsencrypt(args) = cli.command else {
            panic!("expected letsencrypt");
        };
        assert_eq!(args.dns_provider, DnsProviderKind::Digitalocean);
        assert!(args.staging);
        assert!(args.web_app.is_none());
        assert!(args.dns_max_wait_secs.is_none());
    }

    #[test]
    fn test_web_app_requires_its_resource_group() {
        let result = Cli::try_parse_from([
            "infractl",
            "letsencrypt",
            "--domain",
            "www.example.com",
            "--dns-provider",
            "azure",
            "--zone",
            "example.com",
            "--key-vault",
            "kv1",
            "--email",
            "ops@example.com",
            "--web-app",
            "app1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_dns_sync_ip_defaults_ttl() {
        let cli = Cli::try_parse_from([
            "infractl",
            "dns-sync-ip",
            "--dns-provider",
            "azure",
            "--zone",
            "example.com",
            "--resource-group",
            "rg1",
            "--hostname",
            "home.example.com",
        ])
        .expect("parse");
        match cli.command {
            Command::DnsSyncIp { ttl, hostname, .. } => {
                assert_eq!(ttl, DEFAULT_GENERATED_TTL_SECS);
                assert_eq!(hostname, "home.example.com");
            }
            other => panic!("expected dns-sync-ip, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_azure_credentials_are_none() {
        let credentials = azure_args(None, None, None, None)
            .credentials()
            .expect("credentials");
        assert!(credentials.is_none());
    }

    #[test]
    fn test_complete_azure_credentials() {
        let credentials = azure_args(Some("t"), Some("c"), Some("s"), Some("sub"))
            .credentials()
            .expect("credentials")
            .expect("some");
        assert_eq!(credentials.tenant_id, "t");
        assert_eq!(credentials.subscription_id, "sub");
    }

    #[test]
    fn test_partial_azure_credentials_name_what_is_missing() {
        let error = azure_args(Some("t"), None, Some("s"), None)
            .credentials()
            .expect_err("partial credentials");
        assert_eq!(
            error.to_string(),
            "Incomplete Azure credentials, missing AZURE_CLIENT_ID, AZURE_SUBSCRIPTION_ID"
        );
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(0), ExitCode::SUCCESS);
        assert_eq!(exit_code(2), ExitCode::from(2));
        assert_eq!(exit_code(-1), ExitCode::FAILURE);
    }
}
