//! Vault Router CLI - inspect and exercise configured vaults
//!
//! Commands run against the simulated chain; deposits and withdrawals are
//! dry runs that never leave the process.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use vault_router::cli::commands;
use vault_router::config::Config;

/// Default dry-run sender
const DRY_RUN_WALLET: &str = "0x0000000000000000000000000000000000000001";

/// Vault Router - one interface over Aave, Compound, Morpho and Pendle
#[derive(Parser)]
#[command(name = "vaults")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "vaults.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured vaults
    List,

    /// Show current configuration
    Config,

    /// Show the aggregate balance of an address
    Balance {
        /// User address
        user: String,
    },

    /// Show merged deposit/withdraw history of an address
    History {
        /// User address
        user: String,

        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Deposit into a vault (dry run)
    Deposit {
        /// Vault id, e.g. aave-usdc
        vault: String,

        /// Decimal amount, e.g. 12.5
        amount: String,

        /// Asset symbol of the vault
        asset: String,

        /// Sending wallet address
        #[arg(long, env = "VAULTS_WALLET", default_value = DRY_RUN_WALLET)]
        from: String,

        /// Credit the deposit to this address instead of the sender
        #[arg(long)]
        to: Option<String>,
    },

    /// Withdraw from a vault (dry run)
    Withdraw {
        /// Vault id, e.g. aave-usdc
        vault: String,

        /// Decimal amount, e.g. 12.5
        amount: String,

        /// Asset symbol of the vault
        asset: String,

        /// Sending wallet address
        #[arg(long, env = "VAULTS_WALLET", default_value = DRY_RUN_WALLET)]
        from: String,

        /// Pay the withdrawal out to this address instead of the sender
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault_router=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::List => commands::list_vaults(&config),
        Commands::Config => commands::show_config(&config),
        Commands::Balance { user } => commands::balance(&config, &user).await,
        Commands::History { user, limit } => commands::history(&config, &user, limit).await,
        Commands::Deposit {
            vault,
            amount,
            asset,
            from,
            to,
        } => commands::deposit(&config, &from, &vault, &amount, &asset, to.as_deref()).await,
        Commands::Withdraw {
            vault,
            amount,
            asset,
            from,
            to,
        } => commands::withdraw(&config, &from, &vault, &amount, &asset, to.as_deref()).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
