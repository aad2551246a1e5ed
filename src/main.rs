// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use infractl::{
    config::{LetsEncryptSettings, ManageConfiguration, ManageSettings},
    constants::{DEFAULT_DNS_RESOLVER, DEFAULT_GENERATED_TTL_SECS},
    dns::lookup::{DnsLookup, HickoryLookup},
    letsencrypt::{
        acme::HttpAcmeClient, CertificateOutcome, CertificateRequest, LetsEncryptService,
    },
    manage::{
        azure::AzureManageService, digitalocean::DigitalOceanManageService, dns_sync::sync_public_ip,
        export::export_configuration, orchestrator::ManageOrchestrator,
    },
    providers::{
        azure::{auth::AzureCredentials, AzureClient, AzureEndpoints, AzureSession},
        digitalocean::DigitalOceanClient,
        http::JsonApi,
        public_ip::HttpPublicIp,
        AzureProviders, DnsZoneProvider,
    },
    resources::KeyVault,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(name = "infractl", version, about = "Declarative Azure and DigitalOcean manager")]
struct Cli {
    #[command(flatten)]
    azure: AzureArgs,

    /// DigitalOcean API token
    #[arg(long, env = "DIGITALOCEAN_TOKEN", hide_env_values = true, global = true)]
    digitalocean_token: Option<String>,

    /// Resolver used for live DNS lookups
    #[arg(long, env = "DNS_RESOLVER", default_value = DEFAULT_DNS_RESOLVER, global = true)]
    dns_resolver: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct AzureArgs {
    #[arg(long, env = "AZURE_TENANT_ID", global = true)]
    azure_tenant_id: Option<String>,

    #[arg(long, env = "AZURE_CLIENT_ID", global = true)]
    azure_client_id: Option<String>,

    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true, global = true)]
    azure_client_secret: Option<String>,

    #[arg(long, env = "AZURE_SUBSCRIPTION_ID", global = true)]
    azure_subscription_id: Option<String>,
}

impl AzureArgs {
    /// Service principal, when every part of it is given.
    fn credentials(&self) -> Result<Option<AzureCredentials>> {
        match (
            &self.azure_tenant_id,
            &self.azure_client_id,
            &self.azure_client_secret,
            &self.azure_subscription_id,
        ) {
            (None, None, None, None) => Ok(None),
            (Some(tenant_id), Some(client_id), Some(client_secret), Some(subscription_id)) => {
                Ok(Some(AzureCredentials {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    subscription_id: subscription_id.clone(),
                }))
            }
            (tenant_id, client_id, client_secret, subscription_id) => {
                let missing: Vec<&str> = [
                    ("AZURE_TENANT_ID", tenant_id.is_none()),
                    ("AZURE_CLIENT_ID", client_id.is_none()),
                    ("AZURE_CLIENT_SECRET", client_secret.is_none()),
                    ("AZURE_SUBSCRIPTION_ID", subscription_id.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();
                bail!("Incomplete Azure credentials, missing {}", missing.join(", "))
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply a configuration until it converges
    Manage {
        /// Configuration document (.json, .yaml or .yml)
        #[arg(short, long)]
        config: PathBuf,

        /// Seconds to wait before the next pass after progress
        #[arg(long)]
        progress_delay_secs: Option<u64>,

        /// Seconds to wait before the next pass without progress
        #[arg(long)]
        stall_delay_secs: Option<u64>,

        /// Passes without progress before giving up
        #[arg(long)]
        max_stalled_passes: Option<u32>,
    },

    /// Write the live state of the resources named in a configuration
    Export {
        #[arg(short, long)]
        config: PathBuf,

        /// Output document; stdout (JSON) when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Issue or renew a Let's Encrypt certificate
    Letsencrypt(LetsEncryptArgs),

    /// Point an A record at the public IP of this host
    DnsSyncIp {
        #[arg(long, value_enum)]
        dns_provider: DnsProviderKind,

        /// Zone holding the record (e.g. example.com)
        #[arg(long)]
        zone: String,

        /// Resource group of the zone (Azure)
        #[arg(long)]
        resource_group: Option<String>,

        /// Fully qualified name of the record (e.g. home.example.com)
        #[arg(long)]
        hostname: String,

        #[arg(long, default_value_t = DEFAULT_GENERATED_TTL_SECS)]
        ttl: u32,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct LetsEncryptArgs {
    /// Domain of the certificate (e.g. www.example.com)
    #[arg(long)]
    domain: String,

    #[arg(long, value_enum)]
    dns_provider: DnsProviderKind,

    /// Zone receiving the challenge record
    #[arg(long)]
    zone: String,

    /// Resource group of the zone (Azure)
    #[arg(long)]
    zone_resource_group: Option<String>,

    /// Key vault holding the account key and the certificate
    #[arg(long)]
    key_vault: String,

    /// Contact address of the ACME account
    #[arg(long)]
    email: String,

    /// Use the Let's Encrypt staging directory
    #[arg(long)]
    staging: bool,

    /// Web app receiving the certificate
    #[arg(long, requires = "web_app_resource_group")]
    web_app: Option<String>,

    #[arg(long)]
    web_app_resource_group: Option<String>,

    /// Give up when the challenge record is not visible after this many seconds
    #[arg(long)]
    dns_max_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DnsProviderKind {
    Azure,
    Digitalocean,
}

/// Provider clients built from the credentials given on the command line.
struct Clients {
    azure: Option<AzureProviders>,
    digital_ocean: Option<Arc<DigitalOceanClient>>,
    lookup: Arc<dyn DnsLookup>,
    http: reqwest::Client,
}

impl Clients {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let azure = cli.azure.credentials()?.map(|credentials| {
            debug!(credentials = ?credentials, "Using Azure service principal");
            let session = AzureSession::new(
                JsonApi::new(http.clone()),
                credentials,
                AzureEndpoints::default(),
            );
            AzureClient::new(session).into_providers()
        });
        let digital_ocean = cli
            .digitalocean_token
            .as_ref()
            .map(|token| Arc::new(DigitalOceanClient::new(JsonApi::new(http.clone()), token)));
        let lookup = HickoryLookup::from_address(&cli.dns_resolver)
            .with_context(|| format!("Invalid DNS resolver {}", cli.dns_resolver))?;
        Ok(Self {
            azure,
            digital_ocean,
            lookup: Arc::new(lookup),
            http,
        })
    }

    fn azure(&self) -> Result<&AzureProviders> {
        self.azure
            .as_ref()
            .context("Azure credentials are required (AZURE_TENANT_ID, AZURE_CLIENT_ID, AZURE_CLIENT_SECRET, AZURE_SUBSCRIPTION_ID)")
    }

    fn dns(&self, kind: DnsProviderKind) -> Result<Arc<dyn DnsZoneProvider>> {
        match kind {
            DnsProviderKind::Azure => Ok(self.azure()?.dns.clone()),
            DnsProviderKind::Digitalocean => {
                let client: Arc<dyn DnsZoneProvider> = self
                    .digital_ocean
                    .clone()
                    .context("A DigitalOcean token is required (DIGITALOCEAN_TOKEN)")?;
                Ok(client)
            }
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

// Format: timestamp file:line LEVEL message
// RUST_LOG selects the level (default info), RUST_LOG_FORMAT=json switches to JSON.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Command::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "infractl", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let clients = Clients::from_cli(&cli)?;
    match &cli.command {
        Command::Manage {
            config,
            progress_delay_secs,
            stall_delay_secs,
            max_stalled_passes,
        } => {
            let config = ManageConfiguration::load(config)?;
            let mut settings = ManageSettings::default();
            if let Some(secs) = progress_delay_secs {
                settings.progress_delay = Duration::from_secs(*secs);
            }
            if let Some(secs) = stall_delay_secs {
                settings.stall_delay = Duration::from_secs(*secs);
            }
            if let Some(passes) = max_stalled_passes {
                settings.max_stalled_passes = *passes;
            }
            manage(&clients, &config, settings).await
        }
        Command::Export { config, output } => {
            let config = ManageConfiguration::load(config)?;
            let digital_ocean = clients
                .digital_ocean
                .as_ref()
                .map(|client| &**client as &dyn DnsZoneProvider);
            let exported = export_configuration(&config, clients.azure.as_ref(), digital_ocean).await?;
            match output {
                Some(path) => {
                    exported.save(path)?;
                    info!(path = %path.display(), "Configuration exported");
                }
                None => println!("{}", exported.render(false)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Letsencrypt(args) => letsencrypt(&clients, args).await,
        Command::DnsSyncIp {
            dns_provider,
            zone,
            resource_group,
            hostname,
            ttl,
        } => {
            let dns = clients.dns(*dns_provider)?;
            let ip_source = HttpPublicIp::new(JsonApi::new(clients.http.clone()));
            let written = sync_public_ip(
                dns.as_ref(),
                zone,
                resource_group.as_deref(),
                hostname,
                *ttl,
                &ip_source,
            )
            .await?;
            if written {
                println!("{hostname} updated");
            } else {
                println!("{hostname} already up to date");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

async fn manage(
    clients: &Clients,
    config: &ManageConfiguration,
    settings: ManageSettings,
) -> Result<ExitCode> {
    let azure = clients
        .azure
        .clone()
        .map(|providers| AzureManageService::new(providers, clients.lookup.clone()));
    let digital_ocean = clients.digital_ocean.clone().map(|client| {
        DigitalOceanManageService::new(
            client,
            clients.azure.as_ref().map(|p| p.web_apps.clone()),
            clients.lookup.clone(),
        )
    });

    let report = ManageOrchestrator::new(azure, digital_ocean, settings)
        .run(config)
        .await;
    for line in report.summary() {
        println!("{line}");
    }
    Ok(exit_code(report.exit_code()))
}

async fn letsencrypt(clients: &Clients, args: &LetsEncryptArgs) -> Result<ExitCode> {
    let azure = clients.azure()?;
    let dns = clients.dns(args.dns_provider)?;
    let zone = dns
        .find_dns_zone(args.zone_resource_group.as_deref(), &args.zone)
        .await?
        .into_option()
        .with_context(|| format!("DNS zone {} not found", args.zone))?;

    let vault = KeyVault {
        id: None,
        provider: None,
        name: args.key_vault.clone(),
        resource_group: None,
        region_id: None,
    };
    let secrets = azure.key_vaults.secret_store(&vault);

    let web_app = match (&args.web_app, &args.web_app_resource_group) {
        (Some(name), Some(resource_group)) => Some(
            azure
                .web_apps
                .find_web_app(resource_group, name)
                .await?
                .into_option()
                .with_context(|| format!("Web app {resource_group}/{name} not found"))?,
        ),
        _ => None,
    };

    let settings = LetsEncryptSettings {
        dns_max_wait: args.dns_max_wait_secs.map(Duration::from_secs),
        ..LetsEncryptSettings::default()
    };
    let service = LetsEncryptService::new(
        Arc::new(HttpAcmeClient::new(clients.http.clone())),
        clients.lookup.clone(),
        settings,
    );

    let request = CertificateRequest {
        domain: &args.domain,
        zone: &zone,
        dns: dns.as_ref(),
        secrets: secrets.as_ref(),
        web_app: web_app
            .as_ref()
            .map(|app| (azure.web_apps.as_ref(), app)),
        staging: args.staging,
        email: &args.email,
    };
    match service
        .update(&request)
        .await
        .with_context(|| format!("Certificate for {} failed", args.domain))?
    {
        CertificateOutcome::Kept { expires_at } => {
            println!("Certificate for {} still valid until {expires_at}", args.domain);
        }
        CertificateOutcome::Issued { expires_at, pushed } => {
            println!("Certificate for {} issued, valid until {expires_at}", args.domain);
            if pushed {
                println!("Certificate pushed to web app");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

#[cfg(test)]
mod main_tests;
