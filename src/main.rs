use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use supportal_store::config::{AppConfig, DatabaseConfig};
use supportal_store::db::Database;
use supportal_store::export::{write_transcript, OutputFormat};
use supportal_store::logging::{init_logging, OperationTimer};
use supportal_store::migrations::{self, Migrator};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (overrides configuration and DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Configuration file layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Migrate,
    /// Revert the most recently applied migration
    Rollback,
    /// List migrations and whether they are applied
    ShowMigrations,
    /// Print the SQL of a migration
    SqlMigrate {
        /// App label (e.g. supportal)
        app: String,
        /// Migration name (e.g. 0001_initial)
        name: String,

        /// Print the revert SQL instead
        #[arg(long)]
        backwards: bool,
    },
    /// Show row counts for every table
    Stats,
    /// Export a chat session transcript
    ExportSession {
        /// External session identifier
        #[arg(short, long)]
        session_id: String,

        /// Output format (txt, csv or json)
        #[arg(short, long, default_value = "txt")]
        format: String,

        /// Output file; defaults to ./output/<session_id>.<format>
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    // Initialize logging; the guard flushes the log file on exit
    let _guard = init_logging(&config.logging)?;

    info!("Starting supportal-store");

    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| config.get_database_url());

    match &cli.command {
        Commands::SqlMigrate {
            app,
            name,
            backwards,
        } => sql_migrate(app, name, *backwards),
        Commands::Migrate => migrate(&config, &database_url),
        Commands::Rollback => rollback(&config, &database_url),
        Commands::ShowMigrations => show_migrations(&config, &database_url),
        Commands::Stats => show_stats(&config, &database_url),
        Commands::ExportSession {
            session_id,
            format,
            output,
        } => export_session(&config, &database_url, session_id, format, output.as_ref()),
    }
}

/// Open the pool without applying migrations
fn connect(config: &AppConfig, database_url: &str) -> Result<Database> {
    let database_config = DatabaseConfig {
        url: database_url.to_string(),
        ..config.database.clone()
    };
    Database::connect(&database_config).context("Failed to open database")
}

fn migrate(config: &AppConfig, database_url: &str) -> Result<()> {
    let timer = OperationTimer::new("migrate");
    let db = connect(config, database_url)?;

    let applied = db.migrate()?;
    for migration in &applied {
        info!("Applied {}", migration.label());
    }
    info!("{} migration(s) applied", applied.len());

    timer.finish();
    Ok(())
}

fn rollback(config: &AppConfig, database_url: &str) -> Result<()> {
    let db = connect(config, database_url)?;

    match db.rollback()? {
        Some(migration) => info!("Reverted {}", migration.label()),
        None => warn!("Nothing to roll back"),
    }
    Ok(())
}

fn show_migrations(config: &AppConfig, database_url: &str) -> Result<()> {
    let db = connect(config, database_url)?;

    for status in db.migration_status()? {
        let mark = if status.is_applied() { "[X]" } else { "[ ]" };
        match status.applied_at {
            Some(applied_at) => info!("{} {} ({})", mark, status.migration.label(), applied_at),
            None => info!("{} {}", mark, status.migration.label()),
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn sql_migrate(app: &str, name: &str, backwards: bool) -> Result<()> {
    let migration = migrations::find(app, name)
        .with_context(|| format!("Unknown migration {app}.{name}"))?;

    let sql = if backwards {
        migration.down_sql
    } else {
        Migrator::sql(migration)
    };
    println!("-- {}\n{}", migration.label(), sql);
    Ok(())
}

fn show_stats(config: &AppConfig, database_url: &str) -> Result<()> {
    let db = connect(config, database_url)?;
    let stats = db.stats()?;

    for line in stats.to_string().lines() {
        info!("{}", line);
    }
    Ok(())
}

fn export_session(
    config: &AppConfig,
    database_url: &str,
    session_id: &str,
    format: &str,
    output: Option<&PathBuf>,
) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let db = connect(config, database_url)?;

    let session = db
        .get_chat_session(session_id)?
        .with_context(|| format!("Chat session not found: {session_id}"))?;
    let messages = db.get_chat_messages(session.id)?;

    let output = output.cloned().unwrap_or_else(|| {
        PathBuf::from("output").join(format!("{session_id}.{}", format.extension()))
    });
    write_transcript(&session, &messages, format, &output)?;

    info!(
        "Exported {} messages to {}",
        messages.len(),
        output.display()
    );
    Ok(())
}
