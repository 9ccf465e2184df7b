use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db::{ConnectOpts, DbHandle, RetryPolicy};
use mimalloc::MiMalloc;
use runtime::{LoggingConfig, Settings};
use std::path::PathBuf;
use std::time::Duration;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Resume Server - storage backend for resumes and job descriptions
#[derive(Parser)]
#[command(name = "resume-server")]
#[command(about = "Resume Server - storage backend for resumes and job descriptions")]
#[command(version = "0.1.0")]
struct Cli {
    /// Env file to read instead of ./.env
    #[arg(short, long)]
    env_file: Option<PathBuf>,

    /// Print current settings (secrets redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the database and create missing tables
    Init,
    /// Check settings without touching the database
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match cli.env_file.as_deref() {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load settings")?;

    runtime::init_logging(&LoggingConfig::from_settings(&settings, cli.verbose));
    tracing::info!("Resume server starting");

    if cli.print_config {
        println!("{settings:#?}");
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Init) {
        Commands::Init => init_database(&settings).await,
        Commands::Check => check_config(&settings),
    }
}

fn connect_opts(settings: &Settings) -> ConnectOpts {
    ConnectOpts {
        max_conns: Some(settings.db_max_connections),
        acquire_timeout: Some(Duration::from_secs(5)),
        log_statements: settings.debug,
        ..Default::default()
    }
}

async fn init_database(settings: &Settings) -> Result<()> {
    tracing::info!(
        dsn = %settings.redacted_database_url(),
        "Connecting to database"
    );

    // Lazy: the pool is cheap to build, the retry loop owns reaching the server.
    let db = DbHandle::connect_lazy(&settings.database_url(), connect_opts(settings))
        .await
        .context("invalid database configuration")?;

    documents::init_schema(&db, &RetryPolicy::default())
        .await
        .context("database initialization failed")?;

    tracing::info!(engine = ?db.engine(), "Database initialized");
    db.close().await;
    Ok(())
}

fn check_config(settings: &Settings) -> Result<()> {
    tracing::info!("Checking configuration...");
    DbHandle::detect(&settings.database_url()).context("unsupported database URL")?;

    println!("Configuration check passed");
    println!("Database: {}", settings.redacted_database_url());
    Ok(())
}
