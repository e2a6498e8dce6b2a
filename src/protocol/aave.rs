//! Aave v3 - pool-based supply/withdraw, positions held as aTokens

use std::sync::Arc;

use async_trait::async_trait;

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
    deposit: "Supply",
    withdraw: "Withdraw",
};

/// Aave referral code; 0 means none
const REFERRAL_CODE: u128 = 0;

pub struct AaveService {
    core: ServiceCore,
    wallet: WalletSlot<dyn WalletCapability>,
}

impl AaveService {
    pub fn new(
        config: VaultServiceConfig,
        markets: impl IntoIterator<Item = Arc<VaultMarketInfo>>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        Self {
            core: ServiceCore::new(config, markets, chain),
            wallet: WalletSlot::new(Protocol::Aave),
        }
    }

    /// `approve(asset -> pool)` then `pool.supply(asset, amount, onBehalfOf, referral)`
    pub fn supply_calls(market: &VaultMarketInfo, amount: u128, on_behalf_of: &str) -> Vec<ContractCall> {
        let pool = &market.market_address;
        vec![
            ContractCall::approve(&market.asset_address, pool, amount),
            ContractCall::new(
                pool,
                "supply",
                vec![
                    CallArg::address(&market.asset_address),
                    CallArg::Uint(amount),
                    CallArg::address(on_behalf_of),
                    CallArg::Uint(REFERRAL_CODE),
                ],
            ),
        ]
    }

    /// `pool.withdraw(asset, amount, to)`; burns aTokens from the sender
    pub fn withdraw_calls(market: &VaultMarketInfo, amount: u128, to: &str) -> Vec<ContractCall> {
        vec![ContractCall::new(
            &market.market_address,
            "withdraw",
            vec![
                CallArg::address(&market.asset_address),
                CallArg::Uint(amount),
                CallArg::address(to),
            ],
        )]
    }

    async fn execute(&self, kind: OperationKind, params: &VaultOperationParams) -> Result<String> {
        let wallet = self.wallet.get().await?;
        let amount = self.core.prepare(params)?;
        let user = params.user_address.as_deref().unwrap_or(wallet.address());

        let calls = match kind {
            OperationKind::Deposit => Self::supply_calls(&params.market, amount, user),
            OperationKind::Withdraw => Self::withdraw_calls(&params.market, amount, user),
        };

        self.core.submit(wallet.as_ref(), calls).await
    }
}

#[async_trait]
impl AcceptsWallet for AaveService {
    type Wallet = dyn WalletCapability;

    async fn set_wallet(&self, wallet: &Arc<dyn WalletCapability>) {
        self.wallet.set(wallet).await;
        tracing::info!(address = %wallet.address(), "Aave wallet injected");
    }

    async fn wallet_ready(&self) -> bool {
        self.wallet.is_ready().await
    }
}

#[async_trait]
impl ProtocolService for AaveService {
    fn protocol(&self) -> Protocol {
        Protocol::Aave
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
        self.core
            .balances(user_address, |market, user| {
                ContractCall::balance_of(market.position_token(), user)
            })
            .await
    }

    async fn get_transaction_history(&self, user_address: &str) -> Result<Vec<TransactionRecord>> {
        self.core
            .history(user_address, &EVENTS, |market, user| {
                // Pool events are indexed by reserve
                EVENTS.query(&market.market_address, user, Some(&market.asset_address))
            })
            .await
    }
}
