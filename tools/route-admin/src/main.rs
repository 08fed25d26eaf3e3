use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "route-admin")]
#[command(about = "Route catalog administration CLI for Fleet Gateway", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Preview changes without applying them")]
    dry_run: bool,

    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        help = "Database connection URL"
    )]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Apply all pending catalog migrations")]
    Migrate,

    #[command(about = "Insert routes into the catalog")]
    Seed {
        #[arg(
            short,
            long,
            help = "JSON file with an array of routes (defaults to the built-in demo set)"
        )]
        file: Option<PathBuf>,
    },

    #[command(about = "Show the routes currently in the catalog")]
    List,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    let database_url = cli
        .database_url
        .or_else(|| env::var("FLEET_GATEWAY_DATABASE_URL").ok())
        .context(
            "DATABASE_URL must be set either as environment variable or --database-url flag",
        )?;

    match cli.command {
        Commands::Migrate => {
            commands::migrate(&database_url, cli.dry_run).await?;
        }
        Commands::Seed { file } => {
            commands::seed(&database_url, file.as_deref(), cli.dry_run).await?;
        }
        Commands::List => {
            commands::list(&database_url).await?;
        }
    }

    Ok(())
}
