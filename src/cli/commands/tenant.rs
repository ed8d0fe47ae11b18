use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::models::Tenant;
use crate::services::TenantService;
use crate::tenant::PgTenantDirectory;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Create a tenant, or report the existing one for the domain")]
    Create {
        #[arg(help = "Display name")]
        name: String,
        #[arg(help = "Domain used for resolution (matched exactly)")]
        domain: String,
    },

    #[command(about = "List all tenants")]
    List,

    #[command(about = "Show tenant information")]
    Show {
        #[arg(help = "Tenant domain")]
        domain: String,
    },

    #[command(about = "Mark a tenant active so requests resolve to it")]
    Activate {
        #[arg(help = "Tenant domain")]
        domain: String,
    },

    #[command(about = "Mark a tenant inactive; resolution skips it")]
    Deactivate {
        #[arg(help = "Tenant domain")]
        domain: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = super::connect().await?;
    let service = TenantService::new(Arc::new(PgTenantDirectory::new(pool)));

    match cmd {
        TenantCommands::Create { name, domain } => {
            let (tenant, created) = service.create_or_get_tenant(&name, &domain).await?;
            let message = if created {
                format!("Tenant '{}' created with id {}", tenant.domain, tenant.id)
            } else {
                format!("Tenant '{}' already exists with id {}", tenant.domain, tenant.id)
            };
            output_success(
                &output_format,
                &message,
                Some(json!({ "created": created, "tenant": tenant })),
            )
        }
        TenantCommands::List => {
            let tenants = service.list_tenants().await?;
            output_tenants(&output_format, &tenants)
        }
        TenantCommands::Show { domain } => {
            let tenant = service.get_tenant(&domain).await?;
            show_tenant(&output_format, &tenant)
        }
        TenantCommands::Activate { domain } => {
            let tenant = service.set_active(&domain, true).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' activated", tenant.domain),
                Some(json!({ "tenant": tenant })),
            )
        }
        TenantCommands::Deactivate { domain } => {
            let tenant = service.set_active(&domain, false).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' deactivated", tenant.domain),
                Some(json!({ "tenant": tenant })),
            )
        }
    }
}

fn show_tenant(output_format: &OutputFormat, tenant: &Tenant) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "tenant": tenant }))?);
        }
        OutputFormat::Text => {
            println!("ID:      {}", tenant.id);
            println!("Name:    {}", tenant.name);
            println!("Domain:  {}", tenant.domain);
            println!("Active:  {}", tenant.is_active);
            println!("Created: {}", tenant.created_at.format("%Y-%m-%d %H:%M:%S"));
        }
    }
    Ok(())
}
