//! Schema maintenance

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use super::Runtime;

#[derive(Parser, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommands,
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// Create the trigram extension, tables and indexes (idempotent)
    Bootstrap,
    /// List the tables bootstrap manages
    Tables,
}

pub async fn run_schema(args: SchemaArgs, runtime: &Runtime) -> Result<()> {
    match args.command {
        SchemaCommands::Bootstrap => {
            let pool = runtime.pool().await?;
            blogfolio_db::schema::bootstrap(&pool)
                .await
                .context("Schema bootstrap failed")?;
            println!("✅ Schema ready");
        }
        SchemaCommands::Tables => {
            for name in blogfolio_db::schema::table_names() {
                println!("{name}");
            }
        }
    }
    Ok(())
}
