//! Compound III - comet-based supply/withdraw through a [`CometWallet`]

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::chain::{ChainReader, ContractCall};
use crate::error::Result;
use crate::vault::types::{
    OperationKind, Protocol, ProtocolBalance, TransactionRecord, VaultMarketInfo,
    VaultOperationParams, VaultOperationResult, VaultServiceConfig,
};
use crate::wallet::{CometWallet, WalletCapability, WalletSlot};

use super::shared::{EventNames, ServiceCore};
use super::{AcceptsWallet, ProtocolService};

const EVENTS: EventNames = EventNames {
    deposit: "Supply",
    withdraw: "Withdraw",
};

pub struct CompoundService {
    core: ServiceCore,
    wallet: WalletSlot<CometWallet>,
}

impl CompoundService {
    pub fn new(
        config: VaultServiceConfig,
        markets: impl IntoIterator<Item = Arc<VaultMarketInfo>>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        Self {
            core: ServiceCore::new(config, markets, chain),
            wallet: WalletSlot::new(Protocol::Compound),
        }
    }

    async fn execute(&self, kind: OperationKind, params: &VaultOperationParams) -> Result<String> {
        let wallet = self.wallet.get().await?;
        let amount = self.core.prepare(params)?;
        let user = params.user_address.as_deref().unwrap_or(wallet.address());
        let market = &params.market;

        match kind {
            OperationKind::Deposit => {
                wallet
                    .supply_to(&market.market_address, user, &market.asset_address, amount)
                    .await
            }
            OperationKind::Withdraw => {
                wallet
                    .withdraw_to(&market.market_address, user, &market.asset_address, amount)
                    .await
            }
        }
    }
}

#[async_trait]
impl AcceptsWallet for CompoundService {
    type Wallet = CometWallet;

    async fn set_wallet(&self, wallet: &Arc<CometWallet>) {
        self.wallet.set(wallet).await;
        info!(address = %wallet.address(), "Compound wallet injected");
    }

    async fn wallet_ready(&self) -> bool {
        self.wallet.is_ready().await
    }
}

#[async_trait]
impl ProtocolService for CompoundService {
    fn protocol(&self) -> Protocol {
        Protocol::Compound
    }

    fn config(&self) -> &VaultServiceConfig {
        self.core.config()
    }

    async fn deposit(&self, params: VaultOperationParams) -> VaultOperationResult {
        let outcome = self.execute(OperationKind::Deposit, &params).await;
        self.core.settle(OperationKind::Deposit, &params, outcome)
    }

    async fn withdraw(&self, params: VaultOperationParams) -> VaultOperationResult {
        let outcome = self.execute(OperationKind::Withdraw, &params).await;
        self.core.settle(OperationKind::Withdraw, &params, outcome)
    }

    async fn get_balance(&self, user_address: &str) -> Result<ProtocolBalance> {
        // Comet's balanceOf is the supplied base balance including accrued interest
        self.core
            .balances(user_address, |market, user| {
                ContractCall::balance_of(&market.market_address, user)
            })
            .await
    }

    async fn get_transaction_history(&self, user_address: &str) -> Result<Vec<TransactionRecord>> {
        self.core
            .history(user_address, &EVENTS, |market, user| {
                EVENTS.query(&market.market_address, user, None)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CallArg, SimulatedChain};
    use crate::protocol::test_support::{addr, market, user, CHAIN_ID, NETWORK};
    use crate::vault::types::FailureKind;

    fn service(chain: &Arc<SimulatedChain>) -> CompoundService {
        CompoundService::new(
            VaultServiceConfig::new(Protocol::Compound, NETWORK, CHAIN_ID),
            vec![Arc::new(market(Protocol::Compound))],
            chain.clone(),
        )
    }

    #[tokio::test]
    async fn test_requires_comet_wallet() {
        let chain = SimulatedChain::new();
        let compound = service(&chain);

        let params = VaultOperationParams::new(Arc::new(market(Protocol::Compound)), "3");
        let result = compound.withdraw(params).await;

        assert_eq!(result.failure_kind(), Some(FailureKind::WalletNotReady));
    }

    #[tokio::test]
    async fn test_deposit_through_comet() {
        let chain = SimulatedChain::new();
        let compound = service(&chain);
        let comet = Arc::new(CometWallet::new(chain.wallet(&user(), CHAIN_ID)));
        compound.set_wallet(&comet).await;

        let params = VaultOperationParams::new(Arc::new(market(Protocol::Compound)), "3");
        let result = compound.deposit(params).await;

        assert!(result.is_success());
        let sent = chain.transactions().await;
        assert_eq!(sent[1].call.contract, addr(0x21));
        assert_eq!(sent[1].call.function, "supplyTo");
        assert_eq!(
            sent[1].call.args,
            vec![CallArg::address(user()), CallArg::address(addr(0x01)), CallArg::Uint(3_000_000)]
        );
    }

    #[tokio::test]
    async fn test_balance_from_comet() {
        let chain = SimulatedChain::new();
        chain.set_balance(CHAIN_ID, &addr(0x21), &user(), 42);
        let compound = service(&chain);

        let balance = compound.get_balance(&user()).await.unwrap();

        assert_eq!(balance.protocol, Protocol::Compound);
        assert_eq!(balance.positions[0].raw, "42");
        assert_eq!(balance.positions[0].decimals, 6);
    }
}
