//! CLI command implementations
//!
//! Live wallet and chain services are injected by the embedding
//! application. The binary itself runs every command against the simulated
//! chain, so deposits and withdrawals are dry runs.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::chain::SimulatedChain;
use crate::config::Config;
use crate::vault::types::VaultOperationResult;
use crate::vault::VaultManager;
use crate::wallet::{StaticWalletProvider, WalletBinder};

/// Manager wired to a simulated chain, with `wallet_address` bound on every
/// configured chain
struct DryRun {
    manager: VaultManager,
    // Owns the injected wallets for as long as the command runs
    _binder: WalletBinder,
}

async fn dry_run(config: &Config, wallet_address: &str) -> Result<DryRun> {
    warn!("No live chain configured - running against the simulated chain (dry run)");

    let chain = SimulatedChain::new();
    let manager = VaultManager::from_config(config, chain.clone())
        .context("Failed to build vault manager")?;

    let chain_ids: BTreeSet<u64> = manager
        .services()
        .services()
        .iter()
        .map(|handle| handle.config().chain_id)
        .collect();

    let provider = StaticWalletProvider::new();
    for chain_id in chain_ids {
        provider.insert(chain.wallet(wallet_address, chain_id));
    }

    let binder = WalletBinder::new();
    let report = binder.bind(manager.services(), &provider).await;
    info!(bound = ?report.bound, wallet = wallet_address, "Simulated wallet bound");

    Ok(DryRun {
        manager,
        _binder: binder,
    })
}

/// List configured vaults
pub fn list_vaults(config: &Config) -> Result<()> {
    println!("\n=== VAULTS ({}) ===\n", config.network);
    println!(
        "{:<20} {:<10} {:<8} {:<10} {:<10} {}",
        "ID", "PROTOCOL", "ASSET", "NETWORK", "CHAIN", "MARKET"
    );
    println!("{}", "-".repeat(90));

    for vault in &config.vaults {
        println!(
            "{:<20} {:<10} {:<8} {:<10} {:<10} {}",
            vault.id,
            vault.protocol.as_str(),
            vault.symbol,
            vault.network,
            vault.chain_id,
            vault.market_address
        );
    }

    println!();
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display());
    Ok(())
}

/// Show the aggregate balance of `user`
pub async fn balance(config: &Config, user: &str) -> Result<()> {
    let runtime = dry_run(config, user).await?;
    let total = runtime.manager.get_total_balance(user).await?;

    println!("\n=== BALANCES: {} ===\n", user);
    println!("{:<10} {:<20} {:<8} {:>24}", "PROTOCOL", "VAULT", "ASSET", "AMOUNT");
    println!("{}", "-".repeat(65));

    for protocol in &total.by_protocol {
        for position in &protocol.positions {
            println!(
                "{:<10} {:<20} {:<8} {:>24}",
                protocol.protocol.as_str(),
                position.vault_id,
                position.symbol,
                position.amount()?.normalize().to_string()
            );
        }
    }

    println!("\nTotal: {}", total.total.normalize());

    for failure in &total.failures {
        println!("  {} unavailable: {}", failure.protocol, failure.message);
    }

    println!();
    Ok(())
}

/// Show the merged transaction history of `user`
pub async fn history(config: &Config, user: &str, limit: usize) -> Result<()> {
    let runtime = dry_run(config, user).await?;
    let feed = runtime.manager.get_all_transactions(user).await?;

    println!("\n=== TRANSACTION HISTORY: {} ===\n", user);

    if feed.transactions.is_empty() {
        println!("No transactions found.");
    } else {
        println!(
            "{:<20} {:<10} {:<20} {:<9} {:>18} {}",
            "DATE", "PROTOCOL", "VAULT", "KIND", "AMOUNT", "TX"
        );
        println!("{}", "-".repeat(100));

        for record in feed.transactions.iter().take(limit) {
            println!(
                "{:<20} {:<10} {:<20} {:<9} {:>18} {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.protocol.as_str(),
                record.vault_id,
                record.kind.to_string(),
                format!("{} {}", record.amount.normalize(), record.symbol),
                shorten(&record.tx_hash)
            );
        }
    }

    for failure in &feed.failures {
        println!("  {} unavailable: {}", failure.protocol, failure.message);
    }

    println!();
    Ok(())
}

/// Deposit into a vault
pub async fn deposit(
    config: &Config,
    wallet: &str,
    vault_id: &str,
    amount: &str,
    asset: &str,
    receiver: Option<&str>,
) -> Result<()> {
    let runtime = dry_run(config, wallet).await?;
    let result = match receiver {
        Some(receiver) => runtime.manager.deposit_for(vault_id, amount, asset, receiver).await?,
        None => runtime.manager.deposit(vault_id, amount, asset).await?,
    };

    report("deposit", &result)
}

/// Withdraw from a vault
pub async fn withdraw(
    config: &Config,
    wallet: &str,
    vault_id: &str,
    amount: &str,
    asset: &str,
    receiver: Option<&str>,
) -> Result<()> {
    let runtime = dry_run(config, wallet).await?;
    let result = match receiver {
        Some(receiver) => runtime.manager.withdraw_to(vault_id, amount, asset, receiver).await?,
        None => runtime.manager.withdraw(vault_id, amount, asset).await?,
    };

    report("withdraw", &result)
}

fn report(operation: &str, result: &VaultOperationResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);

    if !result.is_success() {
        anyhow::bail!("{} failed: {}", operation, result.error().unwrap_or("unknown error"));
    }

    Ok(())
}

fn shorten(hash: &str) -> String {
    if hash.chars().count() > 14 {
        format!("{}...", hash.chars().take(14).collect::<String>())
    } else {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
network = "base"

[[services]]
protocol = "morpho"
network = "base"
chain_id = 8453

[[vaults]]
id = "morpho-weth"
protocol = "morpho"
asset_address = "0x4200000000000000000000000000000000000006"
market_address = "0xa0E430870c4604CcfC7B38Ca7845B1FF653D0ff1"
chain_id = 8453
network = "base"
decimals = 18
symbol = "WETH"
"#;

    const WALLET: &str = "0x00000000000000000000000000000000000000aa";

    #[tokio::test]
    async fn test_dry_run_binds_wallet() {
        let config = Config::from_toml_str(CONFIG).unwrap();
        let runtime = dry_run(&config, WALLET).await.unwrap();

        let morpho = runtime.manager.services().get_service(crate::vault::Protocol::Morpho).unwrap();
        assert!(morpho.wallet_ready().await);
    }

    #[tokio::test]
    async fn test_deposit_and_failures() {
        let config = Config::from_toml_str(CONFIG).unwrap();

        deposit(&config, WALLET, "morpho-weth", "0.5", "WETH", None).await.unwrap();
        assert!(deposit(&config, WALLET, "morpho-weth", "0.5", "USDC", None).await.is_err());
        assert!(withdraw(&config, WALLET, "aave-usdc", "1", "USDC", None).await.is_err());
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("0x1234"), "0x1234");
        assert_eq!(shorten("0x0123456789abcdef"), "0x0123456789ab...");
        assert_eq!(shorten("0x0123456789abçdef"), "0x0123456789ab...");
        assert_eq!(shorten("0x0123456789aßcdef"), "0x0123456789aß...");
    }
}
