//! Rowkeep CLI
//!
//! Command-line interface for inspecting and maintaining rowkeep databases.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rowkeep_core::{Config, Database, SqliteStorage};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "rowkeep")]
#[command(about = "Rowkeep - inspect and maintain entity tables")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Database file (overrides the configured location)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Config file (overrides ROWKEEP_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database location, size and managed tables
    Status,
    /// List managed tables with their versions
    #[command(alias = "ls")]
    Tables,
    /// Show every row of a table
    Show {
        /// Table name
        table: String,
    },
    /// Drop a table and forget its version
    #[command(alias = "rm")]
    Drop {
        /// Table name
        table: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, database_name, busy_timeout_ms, log_level)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    match cli.command {
        Commands::Config { command } => {
            handle_config_command(command, cli.config.as_ref(), &output)
        }
        Commands::Status => {
            let (db, path) = open_database(&config, cli.database)?;
            commands::status::show(&db, &path, &output)
        }
        Commands::Tables => {
            let (db, _) = open_database(&config, cli.database)?;
            commands::table::list(&db, &output)
        }
        Commands::Show { table } => {
            let (db, _) = open_database(&config, cli.database)?;
            commands::table::show(&db, &table, &output)
        }
        Commands::Drop { table, yes } => {
            let (db, _) = open_database(&config, cli.database)?;
            commands::table::drop_table(&db, &table, yes, &output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(&key, &value, config_path, output)
        }
    }
}

/// Open the database named on the command line, or the configured one
fn open_database(config: &Config, path: Option<PathBuf>) -> Result<(Database, PathBuf)> {
    let path = path.unwrap_or_else(|| config.database_path());
    let storage = SqliteStorage::open_path(&path, config.busy_timeout())
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    debug!("Using database {:?}", path);
    Ok((Database::new(storage), path))
}

/// Log to stderr, filtered by RUST_LOG or the configured level
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rowkeep_core={},rowkeep={}",
            config.log_level, config.log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
