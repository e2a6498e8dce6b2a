//! Protocol services - one uniform surface over Aave, Compound, Morpho and Pendle
//!
//! Each service translates its protocol's call conventions into
//! [`ContractCall`](crate::chain::ContractCall)s, executes them with an
//! injected wallet, and normalizes every failure into a
//! [`VaultOperationResult`] so callers never special-case a protocol.
//!
//! Reads (`get_balance`, `get_transaction_history`) go through the shared
//! [`ChainReader`](crate::chain::ChainReader) and never need a wallet.

pub mod aave;
pub mod compound;
pub mod morpho;
pub mod pendle;
pub mod registry;
pub(crate) mod shared;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::vault::types::{
    Protocol, ProtocolBalance, TransactionRecord, VaultOperationParams, VaultOperationResult,
    VaultServiceConfig,
};

pub use aave::AaveService;
pub use compound::CompoundService;
pub use morpho::MorphoService;
pub use pendle::PendleService;
pub use registry::{ServiceHandle, ServiceRegistry};

/// Uniform operation surface implemented by every protocol
#[async_trait]
pub trait ProtocolService: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn config(&self) -> &VaultServiceConfig;

    /// Deposit `params.amount` into the market; never returns an error,
    /// failures are carried in the result
    async fn deposit(&self, params: VaultOperationParams) -> VaultOperationResult;

    async fn withdraw(&self, params: VaultOperationParams) -> VaultOperationResult;

    /// Positions of `user_address` in every market this service serves
    async fn get_balance(&self, user_address: &str) -> Result<ProtocolBalance>;

    /// Deposits and withdrawals of `user_address`, newest first
    async fn get_transaction_history(&self, user_address: &str) -> Result<Vec<TransactionRecord>>;
}

/// Declares the wallet shape a service accepts
///
/// Injection is a typed call: Compound takes a
/// [`CometWallet`](crate::wallet::CometWallet), the others a generic
/// capability. Re-injection replaces the previous wallet in place.
#[async_trait]
pub trait AcceptsWallet: Send + Sync {
    type Wallet: ?Sized + Send + Sync;

    async fn set_wallet(&self, wallet: &Arc<Self::Wallet>);

    async fn wallet_ready(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures: one market per protocol on Base (8453)

    use std::sync::Arc;

    use crate::chain::{ChainReader, SimulatedChain};
    use crate::vault::registry::VaultRegistry;
    use crate::vault::types::{MarketDetails, Protocol, VaultMarketInfo, VaultServiceConfig};

    use super::ServiceRegistry;

    pub const CHAIN_ID: u64 = 8453;
    pub const NETWORK: &str = "base";

    pub fn addr(n: u8) -> String {
        format!("0x{:040x}", n)
    }

    pub fn user() -> String {
        addr(0xaa)
    }

    pub fn market(protocol: Protocol) -> VaultMarketInfo {
        let (vault_id, symbol, decimals, details) = match protocol {
            Protocol::Aave => (
                "aave-usdc",
                "USDC",
                6,
                MarketDetails::Aave { a_token: addr(0x12), data_provider: None },
            ),
            Protocol::Compound => (
                "compound-usdc",
                "USDC",
                6,
                MarketDetails::Compound { base_token: Some(addr(0x01)), rewards: None },
            ),
            Protocol::Morpho => (
                "morpho-weth",
                "WETH",
                18,
                MarketDetails::Morpho { market_id: None },
            ),
            Protocol::Pendle => (
                "pendle-usde",
                "USDe",
                18,
                MarketDetails::Pendle {
                    router: addr(0x40),
                    pt: addr(0x41),
                    yt: addr(0x42),
                    sy: None,
                },
            ),
        };

        let (asset, market) = match protocol {
            Protocol::Aave => (addr(0x01), addr(0x11)),
            Protocol::Compound => (addr(0x01), addr(0x21)),
            Protocol::Morpho => (addr(0x02), addr(0x31)),
            Protocol::Pendle => (addr(0x03), addr(0x43)),
        };

        VaultMarketInfo {
            vault_id: vault_id.to_string(),
            asset_address: asset,
            market_address: market,
            chain_id: CHAIN_ID,
            network: NETWORK.to_string(),
            decimals,
            symbol: symbol.to_string(),
            details,
        }
    }

    pub fn vault_registry() -> VaultRegistry {
        VaultRegistry::new(
            Protocol::ALL.iter().map(|p| market(*p)).collect(),
            Protocol::ALL
                .iter()
                .map(|p| VaultServiceConfig::new(*p, NETWORK, CHAIN_ID))
                .collect(),
        )
        .expect("fixture vaults are valid")
    }

    pub fn registry_with_all(chain: &Arc<SimulatedChain>) -> ServiceRegistry {
        let reader: Arc<dyn ChainReader> = chain.clone();
        ServiceRegistry::from_vaults(&vault_registry(), NETWORK, reader)
            .expect("fixture services build")
    }
}
