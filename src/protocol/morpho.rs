//! Morpho - MetaMorpho ERC-4626 vault deposit/withdraw

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::chain::{CallArg, ChainReader, ContractCall};
use crate::error::Result;
use crate::vault::types::{
    OperationKind, Protocol, ProtocolBalance, TransactionRecord, VaultMarketInfo,
    VaultOperationParams, VaultOperationResult, VaultServiceConfig,
};
use crate::wallet::{WalletCapability, WalletSlot};

use super::shared::{EventNames, ServiceCore};
use super::{AcceptsWallet, ProtocolService};

const EVENTS: EventNames = EventNames {
    deposit: "Deposit",
    withdraw: "Withdraw",
};

pub struct MorphoService {
    core: ServiceCore,
    wallet: WalletSlot<dyn WalletCapability>,
}

impl MorphoService {
    pub fn new(
        config: VaultServiceConfig,
        markets: impl IntoIterator<Item = Arc<VaultMarketInfo>>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        Self {
            core: ServiceCore::new(config, markets, chain),
            wallet: WalletSlot::new(Protocol::Morpho),
        }
    }

    /// `approve(asset -> vault)` then `vault.deposit(assets, receiver)`
    pub fn deposit_calls(market: &VaultMarketInfo, amount: u128, receiver: &str) -> Vec<ContractCall> {
        let vault = &market.market_address;
        vec![
            ContractCall::approve(&market.asset_address, vault, amount),
            ContractCall::new(
                vault,
                "deposit",
                vec![CallArg::Uint(amount), CallArg::address(receiver)],
            ),
        ]
    }

    /// `vault.withdraw(assets, receiver, owner)`; the wallet is always the owner
    pub fn withdraw_calls(market: &VaultMarketInfo, amount: u128, receiver: &str, owner: &str) -> Vec<ContractCall> {
        vec![ContractCall::new(
            &market.market_address,
            "withdraw",
            vec![
                CallArg::Uint(amount),
                CallArg::address(receiver),
                CallArg::address(owner),
            ],
        )]
    }

    async fn execute(&self, kind: OperationKind, params: &VaultOperationParams) -> Result<String> {
        let wallet = self.wallet.get().await?;
        let amount = self.core.prepare(params)?;
        let receiver = params.user_address.as_deref().unwrap_or(wallet.address());

        let calls = match kind {
            OperationKind::Deposit => Self::deposit_calls(&params.market, amount, receiver),
            OperationKind::Withdraw => {
                Self::withdraw_calls(&params.market, amount, receiver, wallet.address())
            }
        };

        self.core.submit(wallet.as_ref(), calls).await
    }
}

#[async_trait]
impl AcceptsWallet for MorphoService {
    type Wallet = dyn WalletCapability;

    async fn set_wallet(&self, wallet: &Arc<dyn WalletCapability>) {
        self.wallet.set(wallet).await;
        info!(address = %wallet.address(), "Morpho wallet injected");
    }

    async fn wallet_ready(&self) -> bool {
        self.wallet.is_ready().await
    }
}

#[async_trait]
impl ProtocolService for MorphoService {
    fn protocol(&self) -> Protocol {
        Protocol::Morpho
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
        // maxWithdraw reports assets, not shares
        self.core
            .balances(user_address, |market, user| {
                ContractCall::new(&market.market_address, "maxWithdraw", vec![CallArg::address(user)])
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
