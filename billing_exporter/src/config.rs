use anyhow::{bail, Context, Result};
use billing_core::client::DEFAULT_REGION;
use billing_core::CostExplorerConfig;
use billing_metrics::{catalog, MetricSelection};
use clap::{Parser, ValueEnum};
use std::net::{SocketAddr, ToSocketAddrs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "aws_billing_exporter")]
#[command(about = "Prometheus exporter for AWS Cost Explorer billing data", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Address to listen on for web interface and telemetry
    #[arg(
        long = "web.listen-address",
        env = "AWS_BILLING_LISTEN_ADDRESS",
        default_value = ":9614"
    )]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(
        long = "web.telemetry-path",
        env = "AWS_BILLING_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    pub telemetry_path: String,

    /// Comma-separated list of billing metric field numbers (1-7). Leave unset to scrape all
    /// available metrics. See https://docs.aws.amazon.com/aws-cost-management/latest/APIReference/API_GetCostAndUsage.html
    #[arg(long = "aws-billing.metrics", env = "AWS_BILLING_METRICS")]
    pub metrics: Option<String>,

    /// Signing region for the Cost Explorer API
    #[arg(
        long = "aws-billing.region",
        env = "AWS_BILLING_REGION",
        default_value = DEFAULT_REGION
    )]
    pub region: String,

    /// Override the Cost Explorer endpoint URL
    #[arg(long = "aws-billing.endpoint", env = "AWS_BILLING_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long = "log.level", env = "AWS_BILLING_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(
        long = "log.format",
        env = "AWS_BILLING_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub telemetry_path: String,
    pub selection: MetricSelection,
    pub cost_explorer: CostExplorerConfig,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let listen_address = parse_listen_address(&cli.listen_address)?;
        let telemetry_path = validate_telemetry_path(&cli.telemetry_path)?;
        let selection = MetricSelection::parse(cli.metrics.as_deref().unwrap_or_default())
            .with_context(|| {
                format!(
                    "invalid --aws-billing.metrics, expected field numbers from {}",
                    catalog::field_list()
                )
            })?;

        Ok(Self {
            listen_address,
            telemetry_path,
            selection,
            cost_explorer: CostExplorerConfig {
                region: cli.region.clone(),
                endpoint: cli.endpoint.clone().filter(|endpoint| !endpoint.is_empty()),
            },
        })
    }
}

/// Accepts `host:port`, or `:port` for every interface.
pub fn parse_listen_address(address: &str) -> Result<SocketAddr> {
    let address = address.trim();
    let candidate = if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    };

    candidate
        .to_socket_addrs()
        .with_context(|| format!("invalid listen address '{}'", address))?
        .next()
        .with_context(|| format!("listen address '{}' did not resolve", address))
}

fn validate_telemetry_path(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        bail!("telemetry path '{}' must start with '/'", path);
    }
    if path == "/" {
        bail!("telemetry path cannot be '/', it serves the landing page");
    }
    Ok(path.to_string())
}
