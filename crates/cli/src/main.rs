use clap::Parser;
use std::sync::Arc;
use strata_dns_domain::{CliOverrides, Config};
use strata_dns_infrastructure::dns::server;
use strata_dns_infrastructure::dns::ServerMetrics;
use tracing::info;

mod bootstrap;
mod di;

#[derive(Parser)]
#[command(name = "strata-dns")]
#[command(version)]
#[command(about = "Authoritative and recursive DNS server built from per-zone handler chains")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DNS server port
    #[arg(short = 'd', long)]
    dns_port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = CliOverrides {
        dns_port: cli.dns_port,
        bind_address: cli.bind.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = Config::load(cli.config.as_deref(), overrides)?;
    config.validate()?;

    bootstrap::init_logging(&config);
    info!("Starting strata-dns v{}", env!("CARGO_PKG_VERSION"));

    let metrics = Arc::new(ServerMetrics::new());
    let router = Arc::new(di::build_router(&config, Arc::clone(&metrics))?);

    info!(
        zones = config.zones.len(),
        port = config.server.dns_port,
        "Zone table built"
    );

    server::serve(&config.server, router).await?;

    info!("Server shutdown complete");
    Ok(())
}
