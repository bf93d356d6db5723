//! CLI interface for french-tutor

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::security::keyring;
use crate::vocabulary::VocabularyStore;

#[derive(Parser, Debug)]
#[command(name = "french-tutor")]
#[command(about = "WhatsApp French tutor: webhook relay with vocabulary logging", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Vocabulary log to use instead of the configured one
    #[arg(long, global = true, env = "TUTOR_STORE_PATH")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the webhook server (default when no command given)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List learners with logged vocabulary
    Users,
    /// Show a learner's vocabulary summary
    Stats {
        /// Learner id (e.g. whatsapp:+33612345678)
        user: String,
    },
    /// Dump a learner's full vocabulary and corrections as JSON
    Vocab {
        /// Learner id
        user: String,
    },
    /// Show the effective configuration
    Config {
        /// Only print the config file location
        #[arg(long)]
        path: bool,
    },
    /// Store the completion service API key
    SetKey {
        key: String,
    },
    /// Remove the stored API key
    DeleteKey,
}

/// Parse arguments and run
pub async fn run() -> Result<()> {
    run_with(Cli::parse()).await
}

pub async fn run_with(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let api_key = keyring::get_api_key()?;
            let tutor = crate::agent::build_tutor(&config, api_key).await?;
            crate::server::start(config, tutor).await
        }
        Commands::Users => {
            let users = match existing_store(&config.store.path) {
                Some(store) => store.get_all_users().await,
                None => Vec::new(),
            };
            if users.is_empty() {
                println!("No learners logged yet.");
            }
            for user in users {
                println!("{}", user);
            }
            Ok(())
        }
        Commands::Stats { user } => {
            let stats = match existing_store(&config.store.path) {
                Some(store) => store.get_stats(&user).await,
                None => None,
            };
            let Some(stats) = stats else {
                anyhow::bail!("Unknown learner '{}'", user);
            };
            println!("Learner:      {}", user);
            println!("First seen:   {}", stats.first_seen.format("%d/%m/%Y %H:%M"));
            println!("Vocabulary:   {}", stats.total_vocabulary);
            println!("Corrections:  {}", stats.total_corrections);
            if !stats.recent_words.is_empty() {
                println!("\nRecent words:");
                for entry in &stats.recent_words {
                    println!("  {} ({}) - {}", entry.word, entry.date, entry.definition);
                }
            }
            Ok(())
        }
        Commands::Vocab { user } => {
            let record = match existing_store(&config.store.path) {
                Some(store) => store.get_user_vocabulary(&user).await,
                None => None,
            }
            .with_context(|| format!("Unknown learner '{}'", user))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Config { path: true } => {
            println!("{}", config::config_path()?.display());
            Ok(())
        }
        Commands::Config { path: false } => config::show_config(&config),
        Commands::SetKey { key } => {
            keyring::set_api_key(&key)?;
            println!("API key stored securely.");
            Ok(())
        }
        Commands::DeleteKey => {
            keyring::delete_api_key()?;
            println!("API key removed.");
            Ok(())
        }
    }
}

/// The vocabulary log at `path`, or `None` before anything was ever logged
fn existing_store(path: &Path) -> Option<VocabularyStore> {
    path.exists().then(|| VocabularyStore::new(path))
}
