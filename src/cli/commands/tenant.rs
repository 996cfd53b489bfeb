use clap::Subcommand;
use serde_json::json;

use crate::cli::{build_router, OutputFormat};
use crate::services::provisioning::ProvisionOutcome;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Create a tenant's storage and register its connections")]
    Provision {
        #[arg(help = "Tenant id")]
        tenant: String,
    },

    #[command(about = "Close and evict a tenant's registered connections")]
    Deprovision {
        #[arg(help = "Tenant id")]
        tenant: String,
    },

    #[command(about = "Check whether a tenant's connections are registered")]
    Exists {
        #[arg(help = "Tenant id")]
        tenant: String,
    },

    #[command(about = "List registered logical connection names")]
    List,
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let router = build_router()?;
    router.bootstrap().await?;

    match cmd {
        TenantCommands::Provision { tenant } => {
            let outcome = router.provision_tenant(&tenant).await?;
            match output_format {
                OutputFormat::Json => {
                    let payload = match &outcome {
                        ProvisionOutcome::SharedStorage => json!({
                            "tenant": tenant,
                            "outcome": "shared-storage",
                        }),
                        ProvisionOutcome::AlreadyProvisioned => json!({
                            "tenant": tenant,
                            "outcome": "already-provisioned",
                        }),
                        ProvisionOutcome::Provisioned { connections } => json!({
                            "tenant": tenant,
                            "outcome": "provisioned",
                            "connections": connections,
                        }),
                    };
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Text => match &outcome {
                    ProvisionOutcome::SharedStorage => {
                        println!("Tenant '{}' shares main storage, nothing to do", tenant)
                    }
                    ProvisionOutcome::AlreadyProvisioned => {
                        println!("Tenant '{}' is already provisioned", tenant)
                    }
                    ProvisionOutcome::Provisioned { connections } => {
                        println!(
                            "Tenant '{}' provisioned: {}",
                            tenant,
                            connections.join(", ")
                        )
                    }
                },
            }
            Ok(())
        }
        TenantCommands::Deprovision { tenant } => {
            let closed = router.deprovision_tenant(&tenant).await?;
            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "tenant": tenant,
                            "closed": closed,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    if closed.is_empty() {
                        println!("Tenant '{}' had no registered connections", tenant);
                    } else {
                        println!("Tenant '{}' closed: {}", tenant, closed.join(", "));
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Exists { tenant } => {
            let exists = router.tenant_exists(&tenant).await;
            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "tenant": tenant,
                            "exists": exists,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "Tenant '{}' is {}",
                        tenant,
                        if exists { "registered" } else { "not registered" }
                    );
                }
            }
            Ok(())
        }
        TenantCommands::List => {
            let names = router.registry().names().await;
            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({ "connections": names }))?
                    );
                }
                OutputFormat::Text => {
                    if names.is_empty() {
                        println!("No connections registered");
                    } else {
                        for name in names {
                            println!("{}", name);
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
