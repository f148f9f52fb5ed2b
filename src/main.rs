//! Syncstore CLI - inspect and maintain a contact-sync database

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use syncstore::config::{self, StoreConfig};
use syncstore::ui::{self, Icons};
use syncstore::{presence, provenance, stats, PresenceRecord, SqliteHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "syncstore")]
#[command(version)]
#[command(about = "Contact source provenance log and presence cache")]
#[command(long_about = r#"
Syncstore keeps the tables a contact-sync client persists between runs:
  • which sources contributed each local contact
  • the user's last known presence on each network

Example usage:
  syncstore init
  syncstore add-source --contact 42 --source google
  syncstore sources --contact 42
  syncstore set-presence --user u1 --network 7 --status 2
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create both tables
    Init,

    /// Record a source for a contact
    AddSource {
        #[arg(long)]
        contact: i64,
        #[arg(long)]
        source: String,
    },

    /// List the sources recorded for a contact
    Sources {
        #[arg(long)]
        contact: i64,
    },

    /// Remove every source recorded for a contact
    ClearSources {
        #[arg(long)]
        contact: i64,
    },

    /// Write the presence for one network
    SetPresence {
        #[arg(long)]
        user: String,
        #[arg(long)]
        network: i64,
        #[arg(long)]
        status: i64,
    },

    /// List the presence cache
    Presence,

    /// Show row counts
    Stats,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store_config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    // Initialize logging
    let level = if cli.verbose {
        "debug"
    } else {
        store_config.log_level.as_deref().unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| store_config.database_path_in(Path::new(".")));

    match cli.command {
        Commands::Init => {
            open_store(&database, &store_config)?;
            if cli.json {
                print_json(&serde_json::json!({ "initialized": database }))?;
            } else {
                ui::success(&format!("Initialized {}", database.display()));
            }
        }

        Commands::AddSource { contact, source } => {
            let handle = open_store(&database, &store_config)?;
            let source_id = provenance::add_source(&handle, contact, &source)?;
            if cli.json {
                print_json(&serde_json::json!({
                    "contact": contact,
                    "source": source,
                    "source_id": source_id,
                }))?;
            } else {
                ui::success(&format!("Recorded '{}' for contact {} (#{})", source, contact, source_id));
            }
        }

        Commands::Sources { contact } => {
            let handle = open_store(&database, &store_config)?;
            let records = provenance::fetch_records(&handle, contact)?;
            if cli.json {
                let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();
                print_json(&serde_json::json!({ "contact": contact, "sources": sources }))?;
            } else if records.is_empty() {
                ui::empty(&format!("No sources recorded for contact {}.", contact));
            } else {
                ui::header(Icons::LINK, &format!("Sources for contact {}", contact));
                println!("{}", ui::sources_table(&records));
            }
        }

        Commands::ClearSources { contact } => {
            let handle = open_store(&database, &store_config)?;
            let deleted = provenance::delete_all_sources(&handle, contact)?;
            if cli.json {
                print_json(&serde_json::json!({ "contact": contact, "deleted": deleted }))?;
            } else {
                ui::success(&format!("Removed {} source(s) for contact {}", deleted, contact));
            }
        }

        Commands::SetPresence { user, network, status } => {
            let handle = open_store(&database, &store_config)?;
            let record = PresenceRecord::new(user, network, status);
            let outcome = presence::upsert_one(&handle, &record)?;
            if cli.json {
                print_json(&serde_json::json!({ "record": record, "outcome": outcome }))?;
            } else if outcome.is_insert() {
                ui::success(&format!("Cached presence for network {}", network));
            } else {
                ui::success(&format!("Updated presence for network {}", network));
            }
        }

        Commands::Presence => {
            let handle = open_store(&database, &store_config)?;
            let records = presence::load_all(&handle)?;
            if cli.json {
                print_json(&records)?;
            } else if records.is_empty() {
                ui::empty("Presence cache is empty.");
            } else {
                ui::header(Icons::PERSON, "Presence cache");
                println!("{}", ui::presence_table(&records));
            }
        }

        Commands::Stats => {
            let handle = open_store(&database, &store_config)?;
            let stats = stats::collect(&handle)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                ui::header(Icons::STATS, &format!("Syncstore Statistics ({})", database.display()));
                println!("{}", ui::stats_table(&stats));
            }
        }

        Commands::Config { command: ConfigCommand::Init { force } } => {
            let path = cli.config.clone().unwrap_or_else(config::default_config_path);
            config::write_config(&path, &StoreConfig::default(), force)?;
            if cli.json {
                print_json(&serde_json::json!({ "config": path }))?;
            } else {
                ui::success(&format!("Wrote {}", path.display()));
            }
        }
    }

    Ok(())
}

/// Open the database, creating its directory and tables as needed
fn open_store(database: &Path, store_config: &StoreConfig) -> anyhow::Result<SqliteHandle> {
    config::ensure_db_dir(database)?;
    tracing::debug!("Opening {}", database.display());
    let handle = SqliteHandle::open(database, store_config)?;
    syncstore::create_all_schemas(&handle)?;
    Ok(handle)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
