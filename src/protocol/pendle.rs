//! Pendle - deposits split the asset into PT + YT through the router;
//! withdrawals redeem a PT + YT pair back to the asset
//!
//! PY amounts are treated as 1:1 with the asset when deriving min-out
//! bounds, which holds for the stable-asset markets this is configured for.
//! The `slippage_bps` of the service config absorbs the SY exchange rate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::chain::{CallArg, ChainReader, ContractCall};
use crate::error::{Error, Result};
use crate::vault::amount;
use crate::vault::types::{
    MarketDetails, OperationKind, Protocol, ProtocolBalance, TransactionRecord, VaultMarketInfo,
    VaultOperationParams, VaultOperationResult, VaultServiceConfig,
};
use crate::wallet::{WalletCapability, WalletSlot};

use super::shared::{EventNames, ServiceCore};
use super::{AcceptsWallet, ProtocolService};

const EVENTS: EventNames = EventNames {
    deposit: "MintPyFromToken",
    withdraw: "RedeemPyToToken",
};

/// Router, PT and YT of a Pendle market
struct PendleAddresses<'a> {
    router: &'a str,
    pt: &'a str,
    yt: &'a str,
}

fn addresses(market: &VaultMarketInfo) -> Result<PendleAddresses<'_>> {
    match &market.details {
        MarketDetails::Pendle { router, pt, yt, .. } => Ok(PendleAddresses { router, pt, yt }),
        _ => Err(Error::ProtocolExecution {
            protocol: Protocol::Pendle,
            message: format!("vault {} has no Pendle addresses", market.vault_id),
        }),
    }
}

pub struct PendleService {
    core: ServiceCore,
    wallet: WalletSlot<dyn WalletCapability>,
}

impl PendleService {
    pub fn new(
        config: VaultServiceConfig,
        markets: impl IntoIterator<Item = Arc<VaultMarketInfo>>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        Self {
            core: ServiceCore::new(config, markets, chain),
            wallet: WalletSlot::new(Protocol::Pendle),
        }
    }

    /// `approve(asset -> router)` then
    /// `router.mintPyFromToken(receiver, yt, tokenIn, amountIn, minPyOut)`
    ///
    /// The router's `TokenInput` tuple is flattened to `(tokenIn, amountIn)`.
    pub fn mint_calls(
        market: &VaultMarketInfo,
        amount: u128,
        receiver: &str,
        slippage_bps: u32,
    ) -> Result<Vec<ContractCall>> {
        let pendle = addresses(market)?;
        Ok(vec![
            ContractCall::approve(&market.asset_address, pendle.router, amount),
            ContractCall::new(
                pendle.router,
                "mintPyFromToken",
                vec![
                    CallArg::address(receiver),
                    CallArg::address(pendle.yt),
                    CallArg::address(&market.asset_address),
                    CallArg::Uint(amount),
                    CallArg::Uint(amount::min_out(amount, slippage_bps)),
                ],
            ),
        ])
    }

    /// Approve PT and YT to the router, then
    /// `router.redeemPyToToken(receiver, yt, netPyIn, tokenOut, minTokenOut)`
    pub fn redeem_calls(
        market: &VaultMarketInfo,
        amount: u128,
        receiver: &str,
        slippage_bps: u32,
    ) -> Result<Vec<ContractCall>> {
        let pendle = addresses(market)?;
        Ok(vec![
            ContractCall::approve(pendle.pt, pendle.router, amount),
            ContractCall::approve(pendle.yt, pendle.router, amount),
            ContractCall::new(
                pendle.router,
                "redeemPyToToken",
                vec![
                    CallArg::address(receiver),
                    CallArg::address(pendle.yt),
                    CallArg::Uint(amount),
                    CallArg::address(&market.asset_address),
                    CallArg::Uint(amount::min_out(amount, slippage_bps)),
                ],
            ),
        ])
    }

    async fn execute(&self, kind: OperationKind, params: &VaultOperationParams) -> Result<String> {
        let wallet = self.wallet.get().await?;
        let amount = self.core.prepare(params)?;
        let receiver = params.user_address.as_deref().unwrap_or(wallet.address());
        let slippage_bps = self.core.config().slippage_bps;

        let calls = match kind {
            OperationKind::Deposit => Self::mint_calls(&params.market, amount, receiver, slippage_bps)?,
            OperationKind::Withdraw => Self::redeem_calls(&params.market, amount, receiver, slippage_bps)?,
        };

        self.core.submit(wallet.as_ref(), calls).await
    }
}

#[async_trait]
impl AcceptsWallet for PendleService {
    type Wallet = dyn WalletCapability;

    async fn set_wallet(&self, wallet: &Arc<dyn WalletCapability>) {
        self.wallet.set(wallet).await;
        info!(address = %wallet.address(), "Pendle wallet injected");
    }

    async fn wallet_ready(&self) -> bool {
        self.wallet.is_ready().await
    }
}

#[async_trait]
impl ProtocolService for PendleService {
    fn protocol(&self) -> Protocol {
        Protocol::Pendle
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
        // PT redeems 1:1 for the asset at maturity
        self.core
            .balances(user_address, |market, user| {
                ContractCall::balance_of(market.position_token(), user)
            })
            .await
    }

    async fn get_transaction_history(&self, user_address: &str) -> Result<Vec<TransactionRecord>> {
        self.core
            .history(user_address, &EVENTS, |market, user| {
                // The router is shared across markets; narrow by YT
                let router = addresses(market).map(|a| a.router).unwrap_or(market.market_address.as_str());
                let yt = addresses(market).ok().map(|a| a.yt);
                EVENTS.query(router, user, yt)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;
    use crate::protocol::test_support::{addr, market, user, CHAIN_ID, NETWORK};
    use crate::vault::types::{FailureKind, TransactionKind};

    fn service(chain: &Arc<SimulatedChain>) -> PendleService {
        PendleService::new(
            VaultServiceConfig::new(Protocol::Pendle, NETWORK, CHAIN_ID),
            vec![Arc::new(market(Protocol::Pendle))],
            chain.clone(),
        )
    }

    #[test]
    fn test_mint_applies_slippage() {
        let calls = PendleService::mint_calls(&market(Protocol::Pendle), 1_000_000, &user(), 50).unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].contract, addr(0x40));
        assert_eq!(calls[1].args[1], CallArg::address(addr(0x42)));
        assert_eq!(calls[1].args[4], CallArg::Uint(995_000));
    }

    #[test]
    fn test_redeem_approves_pt_and_yt() {
        let calls = PendleService::redeem_calls(&market(Protocol::Pendle), 7, &user(), 0).unwrap();

        let approved: Vec<_> = calls[..2].iter().map(|c| c.contract.clone()).collect();
        assert_eq!(approved, vec![addr(0x41), addr(0x42)]);
        assert_eq!(calls[2].function, "redeemPyToToken");
    }

    #[test]
    fn test_non_pendle_market_rejected() {
        assert!(PendleService::mint_calls(&market(Protocol::Aave), 1, &user(), 0).is_err());
    }

    #[tokio::test]
    async fn test_slippage_revert_normalized() {
        let chain = SimulatedChain::new();
        let pendle = service(&chain);
        let wallet: Arc<dyn WalletCapability> = chain.wallet(&user(), CHAIN_ID);
        pendle.set_wallet(&wallet).await;
        chain.revert_on("mintPyFromToken", "Slippage: INSUFFICIENT_PY_OUT");

        let params = VaultOperationParams::new(Arc::new(market(Protocol::Pendle)), "100");
        let result = pendle.deposit(params).await;

        assert_eq!(result.failure_kind(), Some(FailureKind::ProtocolExecution));
        assert!(result.error().unwrap().contains("INSUFFICIENT_PY_OUT"));
    }

    #[tokio::test]
    async fn test_history_filters_by_yt() {
        let chain = SimulatedChain::new();
        let pendle = service(&chain);
        let wallet: Arc<dyn WalletCapability> = chain.wallet(&user(), CHAIN_ID);
        pendle.set_wallet(&wallet).await;

        // Same router, different market
        let mut other = market(Protocol::Pendle);
        other.vault_id = "pendle-other".to_string();
        other.details = MarketDetails::Pendle {
            router: addr(0x40),
            pt: addr(0x51),
            yt: addr(0x52),
            sy: None,
        };
        let calls = PendleService::mint_calls(&other, 5, &user(), 0).unwrap();
        crate::wallet::send_sequence(wallet.as_ref(), calls).await.unwrap();

        let params = VaultOperationParams::new(Arc::new(market(Protocol::Pendle)), "1");
        assert!(pendle.deposit(params).await.is_success());

        let history = pendle.get_transaction_history(&user()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].vault_id, "pendle-usde");
        assert_eq!(history[0].kind, TransactionKind::Deposit);
    }
}
