use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::schema::{ensure_schema, tables};

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create any missing tables and indexes")]
    Migrate,
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DbCommands::Migrate => {
            let pool = super::connect().await?;
            ensure_schema(&pool).await?;

            let tables: Vec<&str> = tables().collect();
            output_success(
                &output_format,
                &format!("Schema up to date ({} tables)", tables.len()),
                Some(json!({ "tables": tables })),
            )
        }
    }
}
