mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vcat_core::StalePolicy;

#[derive(Debug, Parser)]
#[command(name = "vcat-cli")]
#[command(about = "Vendor catalog importer command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Import every CSV document waiting in the import directory
    Import {
        /// Run the whole import against an empty in-memory catalog; nothing is
        /// written and no document is archived
        #[arg(long)]
        dry_run: bool,

        /// Read documents from this directory instead of `VCAT_IMPORT_DIR`
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Download images for templates flagged for an image refresh
    Images,
    /// Apply the stale policy over completed imports not yet reconciled
    Reconcile {
        /// Override `VCAT_STALE_POLICY` for this pass (archive, flag or none)
        #[arg(long)]
        policy: Option<StalePolicy>,
    },
    /// Show recent import runs, attachments and pending images
    Status {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("vcat-cli: no command given; run with --help");
        return Ok(());
    };

    let config = vcat_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => commands::db_ping(&config).await,
            DbCommands::Migrate => commands::db_migrate(&config).await,
        },
        Commands::Import { dry_run, dir } => commands::import(&config, dry_run, dir).await,
        Commands::Images => commands::images(&config).await,
        Commands::Reconcile { policy } => commands::reconcile(&config, policy).await,
        Commands::Status { limit } => commands::status(&config, limit).await,
    }
}

#[cfg(test)]
mod tests;
