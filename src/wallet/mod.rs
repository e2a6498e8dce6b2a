//! Wallet capability module
//!
//! Signing and sending are owned by an external wallet service. This module
//! defines the capability protocol services need, the guarded slot they keep
//! it in, and the binder that injects ready wallets after construction.
//!
//! # Architecture
//!
//! ```text
//! WalletProvider → WalletBinder → ServiceRegistry → ProtocolService::set_wallet
//!                      │
//!                 CometWallet (Compound adapter)
//! ```
//!
//! Services hold weak references only. The binder (or whoever injected)
//! owns the capability; dropping it makes the service report
//! `WalletNotReady` again.

pub mod comet;
pub mod manager;
pub mod slot;
pub mod types;

use async_trait::async_trait;
use tracing::debug;

use crate::chain::ContractCall;
use crate::error::{Error, Result};

pub use comet::CometWallet;
pub use manager::{BindReport, StaticWalletProvider, WalletBinder, WalletProvider};
pub use slot::WalletSlot;
pub use types::{SignedTransaction, TransactionRequest};

/// Per-chain signing/sending handle supplied by the wallet service
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Address transactions are sent from
    fn address(&self) -> &str;

    /// Chain this handle signs for
    fn chain_id(&self) -> u64;

    /// Sign an arbitrary message, returning the hex signature
    async fn sign_message(&self, message: &[u8]) -> Result<String>;

    /// Sign without broadcasting
    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<SignedTransaction>;

    /// Sign and broadcast, returning the transaction hash once mined
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<String>;
}

/// Send `calls` in order from `wallet`, returning the hash of the last one
///
/// Stops at the first failure; earlier transactions (approvals) are not
/// rolled back.
pub async fn send_sequence<W>(wallet: &W, calls: Vec<ContractCall>) -> Result<String>
where
    W: WalletCapability + ?Sized,
{
    let mut last_hash = None;

    for call in calls {
        debug!(from = %wallet.address(), call = %call, "Sending transaction");
        let request = TransactionRequest::new(wallet.chain_id(), wallet.address(), call);
        last_hash = Some(wallet.send_transaction(request).await?);
    }

    last_hash.ok_or_else(|| Error::TransactionSend("No calls to send".to_string()))
}
