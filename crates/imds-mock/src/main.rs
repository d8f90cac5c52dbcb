//! imds-mock — easy mocking of the Amazon EC2 Instance Metadata Service.
//!
//! Serves the metadata of an on-demand EC2 instance, optionally tagged,
//! token gated, or turned into a spot instance with a pending interruption.
//!
//! # Usage
//!
//! ```text
//! imds-mock --port 1338 --instance-tags Name=web,Team=infra
//! imds-mock --spot --spot-action stop=2m --imdsv2
//! imds-mock --config imds.toml --pretty
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use imds_api::ImdsServer;
use imds_core::{ImdsConfig, SpotActionEvent};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "imds-mock",
    version,
    about = "Easy mocking of the Amazon EC2 Instance Metadata Service (IMDS)"
)]
struct Cli {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exclude access to instance tags associated with the instance.
    #[arg(long)]
    exclude_instance_tags: bool,

    /// Enforce IMDSv2, requiring all requests to contain a valid metadata token.
    #[arg(long)]
    imdsv2: bool,

    /// Instance tags (key pairs) to expose as metadata, e.g. Name=web,Team=infra.
    #[arg(long, value_delimiter = ',', value_parser = parse_tag)]
    instance_tags: Vec<(String, String)>,

    /// Port to listen on [default: 1338].
    #[arg(long)]
    port: Option<u16>,

    /// Pretty print JSON returned by instance categories.
    #[arg(long)]
    pretty: bool,

    /// Simulate a spot instance and interruption notice.
    #[arg(long)]
    spot: bool,

    /// Type and delay of the spot interruption notice [default: terminate=0s].
    #[arg(long)]
    spot_action: Option<SpotActionEvent>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn parse_tag(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, tag)) if !key.is_empty() => Ok((key.to_string(), tag.to_string())),
        _ => Err(format!("{value} must be formatted as key=value")),
    }
}

impl Cli {
    /// Config file values (or defaults) with any given flags applied on top.
    fn resolve_config(&self) -> anyhow::Result<ImdsConfig> {
        let mut config = match &self.config {
            Some(path) => ImdsConfig::from_file(path)?,
            None => ImdsConfig::default(),
        };

        config.exclude_instance_tags |= self.exclude_instance_tags;
        config.strict_token_auth |= self.imdsv2;
        config.pretty_print_json |= self.pretty;
        config.simulate_spot |= self.spot;
        if !self.instance_tags.is_empty() {
            config.instance_tags = self.instance_tags.iter().cloned().collect::<BTreeMap<_, _>>();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(spot_action) = self.spot_action {
            config.spot_action = spot_action;
        }
        Ok(config)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,imds=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.resolve_config()?;
    info!(
        port = config.port,
        strict_token_auth = config.strict_token_auth,
        simulate_spot = config.simulate_spot,
        spot_action = %config.spot_action,
        "imds mock starting"
    );

    let server = ImdsServer::new(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], server.port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
