//! Compound III (Comet) wallet adapter
//!
//! Wraps a generic wallet and speaks Comet's call conventions: approve the
//! comet for the asset, then `supplyTo` / `withdrawTo`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::chain::{CallArg, ContractCall};
use crate::error::Result;

use super::types::{SignedTransaction, TransactionRequest};
use super::{send_sequence, WalletCapability};

/// Compound-specific wrapper around a generic wallet capability
pub struct CometWallet {
    inner: Arc<dyn WalletCapability>,
}

impl CometWallet {
    pub fn new(inner: Arc<dyn WalletCapability>) -> Self {
        Self { inner }
    }

    /// Calls that supply `amount` of `asset` into `comet`, credited to `dst`
    pub fn supply_calls(comet: &str, dst: &str, asset: &str, amount: u128) -> Vec<ContractCall> {
        vec![
            ContractCall::approve(asset, comet, amount),
            ContractCall::new(
                comet,
                "supplyTo",
                vec![
                    CallArg::address(dst),
                    CallArg::address(asset),
                    CallArg::Uint(amount),
                ],
            ),
        ]
    }

    /// Call that withdraws `amount` of `asset` from `comet` to `to`
    pub fn withdraw_call(comet: &str, to: &str, asset: &str, amount: u128) -> ContractCall {
        ContractCall::new(
            comet,
            "withdrawTo",
            vec![
                CallArg::address(to),
                CallArg::address(asset),
                CallArg::Uint(amount),
            ],
        )
    }

    /// Approve and supply; returns the supply transaction hash
    pub async fn supply_to(&self, comet: &str, dst: &str, asset: &str, amount: u128) -> Result<String> {
        send_sequence(self.inner.as_ref(), Self::supply_calls(comet, dst, asset, amount)).await
    }

    pub async fn withdraw_to(&self, comet: &str, to: &str, asset: &str, amount: u128) -> Result<String> {
        send_sequence(self.inner.as_ref(), vec![Self::withdraw_call(comet, to, asset, amount)]).await
    }
}

#[async_trait]
impl WalletCapability for CometWallet {
    fn address(&self) -> &str {
        self.inner.address()
    }

    fn chain_id(&self) -> u64 {
        self.inner.chain_id()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        self.inner.sign_message(message).await
    }

    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<SignedTransaction> {
        self.inner.sign_transaction(tx).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<String> {
        self.inner.send_transaction(tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;

    #[tokio::test]
    async fn test_supply_approves_first() {
        let chain = SimulatedChain::new();
        let comet = CometWallet::new(chain.wallet("0xuser", 8453));

        let hash = comet.supply_to("0xcomet", "0xuser", "0xusdc", 5_000_000).await.unwrap();

        let sent = chain.transactions().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].call.function, "approve");
        assert_eq!(sent[1].call.function, "supplyTo");
        assert_eq!(sent[1].tx_hash, hash);
        assert_eq!(comet.address(), "0xuser");
    }
}
