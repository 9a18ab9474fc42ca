//! blogfolio CLI - page through posts, comments and users
//!
//! Every listing prints one page plus the cursor for the next; pass it back
//! with `--next` to continue. Sorting and filters match what the library
//! exposes to any other caller.

use std::path::PathBuf;

use anyhow::{Context, Result};
use blogfolio_db::AppConfig;
use clap::{Parser, Subcommand};
use tracing::debug;

mod commands;
mod config;
mod tracing_setup;

use commands::Runtime;

#[derive(Parser, Debug)]
#[command(
    name = "blogfolio",
    author,
    version,
    about = "Keyset-paginated listings of posts, comments and users",
    long_about = "Browse a blogfolio PostgreSQL database with stable cursors. Sort by recency, \
                  popularity, relevance or any combination of fields without skipping or \
                  repeating rows across pages."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.blogfolio/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// PostgreSQL connection string (overrides config file)
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts
    Posts(commands::list::PostsArgs),
    /// List comments on a post, replies to a comment, or all comments
    Comments(commands::list::CommentsArgs),
    /// List users, followers or followees
    Users(commands::list::UsersArgs),
    /// Schema maintenance (bootstrap, tables)
    Schema(commands::schema::SchemaArgs),
    /// Manage blogfolio configuration (init, show, validate, path)
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    // Config commands manage the file itself, so they must work when it is broken
    match cli.command {
        Commands::Config(args) => config::run_config(args, cli.config),
        command => run(command, cli.config, cli.database_url).await,
    }
}

async fn run(
    command: Commands,
    config: Option<PathBuf>,
    database_url: Option<String>,
) -> Result<()> {
    let mut app_config = AppConfig::load(config.as_deref()).context("Failed to load config")?;
    if let Some(url) = database_url {
        app_config.database.database_url = Some(url);
    }
    debug!(page = ?app_config.page, "configuration loaded");

    let runtime = Runtime::new(app_config);
    match command {
        Commands::Posts(args) => commands::run_posts(args, &runtime).await,
        Commands::Comments(args) => commands::run_comments(args, &runtime).await,
        Commands::Users(args) => commands::run_users(args, &runtime).await,
        Commands::Schema(args) => commands::run_schema(args, &runtime).await,
        Commands::Config(args) => config::run_config(args, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blogfolio",
            "posts",
            "--sort",
            "popularity",
            "--debug",
            "--database-url",
            "postgres://localhost/test",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.database_url.as_deref(), Some("postgres://localhost/test"));
        assert!(matches!(cli.command, Commands::Posts(_)));
    }
}
