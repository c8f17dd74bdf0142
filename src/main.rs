//! Taker Lightmining Bot - multi-wallet mining automation
//!
//! # WARNING
//! - Vault files and their salt files are a pair. Losing either one, or the
//!   storage password, makes the stored wallets permanently unrecoverable.
//! - Activation sends a real on-chain transaction from each wallet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Use the library crate
use taker_miner::cli::commands;
use taker_miner::config::Config;

/// Taker Lightmining Bot - multi-wallet mining automation
#[derive(Parser)]
#[command(name = "taker-miner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet vault management
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Proxy vault management
    Proxy {
        #[command(subcommand)]
        action: ProxyAction,
    },

    /// Run mining for stored wallets
    Mine {
        /// Wallet selection like "1-3,5,7-9"; all wallets when omitted
        #[arg(long)]
        select: Option<String>,
    },

    /// Check mining status and rewards for all wallets
    Status,

    /// Show a wallet's on-chain balance
    Balance {
        /// Wallet name, e.g. Wallet_3
        wallet: String,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    /// Add a single wallet (key prompted without echo)
    Add,

    /// Add several comma-separated keys at once
    BulkAdd,

    /// List stored wallets
    List,

    /// Remove wallets by selection, e.g. "1-3,5"
    Remove {
        selection: String,
    },
}

#[derive(Subcommand)]
enum ProxyAction {
    /// Add comma-separated proxy URLs to the unassigned pool
    Add {
        /// scheme://[user:pass@]host:port, comma separated
        urls: String,
    },

    /// Import wallet-assigned proxies from a CSV file
    ImportCsv {
        path: PathBuf,
    },

    /// Import wallet-assigned proxies from a JSON file
    ImportJson {
        path: PathBuf,
    },

    /// Rebuild wallet assignments round-robin over the pool
    Assign {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// List stored proxies
    List,

    /// Show usage statistics
    Stats,

    /// Remove a proxy by identifier (proxy_<n> or wallet address)
    Remove {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Add => commands::wallet_add(&config),
            WalletAction::BulkAdd => commands::wallet_bulk_add(&config),
            WalletAction::List => commands::wallet_list(&config),
            WalletAction::Remove { selection } => commands::wallet_remove(&config, &selection),
        },
        Commands::Proxy { action } => match action {
            ProxyAction::Add { urls } => commands::proxy_add(&config, &urls),
            ProxyAction::ImportCsv { path } => commands::proxy_import_csv(&config, &path),
            ProxyAction::ImportJson { path } => commands::proxy_import_json(&config, &path),
            ProxyAction::Assign { force } => commands::proxy_assign(&config, force),
            ProxyAction::List => commands::proxy_list(&config),
            ProxyAction::Stats => commands::proxy_stats(&config),
            ProxyAction::Remove { id } => commands::proxy_remove(&config, &id),
        },
        Commands::Mine { select } => commands::mine(&config, select.as_deref()).await,
        Commands::Status => commands::status(&config).await,
        Commands::Balance { wallet } => commands::balance(&config, &wallet).await,
    }
}
