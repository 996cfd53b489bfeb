pub mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::{config, ConnectionMap};
use crate::database::factory::ConnectionFactory;
use crate::database::registry::ConnectionRegistry;
use crate::database::router::TenantRouter;
use crate::services::provisioning::ProvisioningService;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Stratum - multi-tenant database connection manager")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the connection manager with its health probe endpoints")]
    Server,

    #[command(about = "Tenant storage provisioning")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Probe every registered connection and report status")]
    Health,
}

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Server => commands::server::handle().await,
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, output_format).await,
        Commands::Health => commands::health::handle(output_format).await,
    }
}

/// Assemble the registry, factory, provisioner and router from the process
/// config. Bootstrap is left to the caller so failures surface there.
pub(crate) fn build_router() -> anyhow::Result<Arc<TenantRouter>> {
    let config = config();
    let connections = ConnectionMap::load()?;
    let registry = Arc::new(ConnectionRegistry::new());
    let factory = ConnectionFactory::new(&config.database);
    let provisioner = ProvisioningService::new(
        registry.clone(),
        factory,
        config.tenancy.clone(),
        connections,
    );
    Ok(Arc::new(TenantRouter::new(
        config.tenancy.clone(),
        registry,
        provisioner,
    )))
}
