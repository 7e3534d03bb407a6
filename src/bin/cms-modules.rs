//! # CMS Module Tool
//!
//! Command-line tool for inspecting modules and configuration without
//! starting the CMS: list what discovery finds on disk, show installed module
//! status from the configured database, and check the effective configuration.

use clap::{Parser, Subcommand, ValueEnum};
use cms_core::config::{CmsConfig, ConfigManager};
use cms_core::database::{DatabaseConnection, ModuleStore, PgStore};
use cms_core::modules::ModuleDiscovery;
use std::path::PathBuf;
use std::process;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "cms-modules")]
#[command(about = "Inspect CMS modules and configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to load configuration for (defaults to CMS_ENV / APP_ENV)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory holding cms.yaml and cms.<env>.yaml
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List modules found in the search paths
    Scan {
        /// Extra search paths, scanned after the configured ones
        #[arg(short, long)]
        path: Vec<PathBuf>,
    },

    /// List installed modules and their status
    Status,

    /// Load, validate and print the effective configuration
    ValidateConfig,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let result = match &cli.command {
        Commands::Scan { path } => scan(&cli, path),
        Commands::Status => status(&cli).await,
        Commands::ValidateConfig => validate_config(&cli),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>, Box<dyn std::error::Error>> {
    let manager = match &cli.environment {
        Some(environment) => {
            ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)?
        }
        None => ConfigManager::load_from_directory(cli.config_dir.clone())?,
    };
    Ok(manager)
}

fn scan(cli: &Cli, extra_paths: &[PathBuf]) -> CliResult {
    let manager = load_config(cli)?;
    let config: &CmsConfig = manager.config();

    let discovery = ModuleDiscovery::from_config(&config.modules);
    for path in extra_paths {
        if !discovery.add_search_path(path) {
            eprintln!("warning: search path {} does not exist", path.display());
        }
    }

    let modules = discovery.scan();
    match cli.format {
        OutputFormat::Json => {
            let listing: Vec<serde_json::Value> = modules
                .values()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id,
                        "name": d.name,
                        "version": d.version,
                        "requires": d.requires,
                        "path": d.path,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Table => {
            println!("{:<24} {:<12} {:<24} PATH", "ID", "VERSION", "REQUIRES");
            for descriptor in modules.values() {
                println!(
                    "{:<24} {:<12} {:<24} {}",
                    descriptor.id,
                    descriptor.version,
                    descriptor.requires.join(","),
                    descriptor.path.display()
                );
            }
            println!("\n{} module(s) found", modules.len());
        }
    }
    Ok(())
}

async fn status(cli: &Cli) -> CliResult {
    let manager = load_config(cli)?;
    let connection = DatabaseConnection::new(&manager.config().database).await?;
    if !connection.health_check().await? {
        return Err("database health check failed".into());
    }
    let store = PgStore::new(connection.pool().clone());

    let records = store.list_modules().await?;
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => {
            println!("{:<24} {:<10} {:<12} INSTALLED", "SLUG", "STATUS", "VERSION");
            for record in &records {
                println!(
                    "{:<24} {:<10} {:<12} {}",
                    record.slug,
                    record.status,
                    record.version,
                    record.installed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    connection.close().await;
    Ok(())
}

fn validate_config(cli: &Cli) -> CliResult {
    let manager = load_config(cli)?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        }
        OutputFormat::Table => {
            println!("Environment: {}", manager.environment());
            println!("Config Directory: {}", manager.config_directory().display());
            println!();
            println!("{}", serde_yaml::to_string(&manager.debug_config())?);
            println!("Configuration is valid");
        }
    }
    Ok(())
}
