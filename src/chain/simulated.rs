//! In-memory chain used for dry runs and tests
//!
//! Balances are a plain ledger seeded with [`SimulatedChain::set_balance`];
//! sent transactions are recorded and emitted as events but never move
//! balances. Reads and sends can be made to fail, revert or stall per
//! contract/function.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::wallet::{SignedTransaction, TransactionRequest, WalletCapability};

use super::{same_address, ChainEvent, ChainReader, ContractCall, EventQuery};

const GENESIS_TIMESTAMP: i64 = 1_700_000_000;
const GENESIS_BLOCK: u64 = 1_000;
const BLOCK_TIME_SECS: i64 = 12;

/// A transaction accepted by the simulated chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransaction {
    pub chain_id: u64,
    pub from: String,
    pub call: ContractCall,
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LoggedEvent {
    chain_id: u64,
    event: ChainEvent,
    /// Indexed addresses besides the account
    topics: Vec<String>,
}

/// Ledger key: (chain, contract, owner), addresses lowercased
type LedgerKey = (u64, String, String);

#[derive(Default)]
pub struct SimulatedChain {
    ledger: DashMap<LedgerKey, u128>,
    read_failures: DashMap<String, String>,
    read_delays: DashMap<String, Duration>,
    reverts: DashMap<String, String>,
    transactions: RwLock<Vec<SimulatedTransaction>>,
    events: RwLock<Vec<LoggedEvent>>,
    nonce: AtomicU64,
    clock: AtomicI64,
    reads: AtomicUsize,
}

impl SimulatedChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clock: AtomicI64::new(GENESIS_TIMESTAMP),
            ..Self::default()
        })
    }

    /// A wallet on this chain sending from `address`
    pub fn wallet(self: &Arc<Self>, address: &str, chain_id: u64) -> Arc<SimulatedWallet> {
        Arc::new(SimulatedWallet {
            chain: Arc::clone(self),
            address: address.to_string(),
            chain_id,
        })
    }

    /// Seed the value `balanceOf`/`maxWithdraw` returns for `owner` on `contract`
    pub fn set_balance(&self, chain_id: u64, contract: &str, owner: &str, raw: u128) {
        self.ledger.insert(ledger_key(chain_id, contract, owner), raw);
    }

    /// Make every read against `contract` fail with `reason`
    pub fn fail_reads(&self, contract: &str, reason: &str) {
        self.read_failures.insert(contract.to_lowercase(), reason.to_string());
    }

    /// Stall every read against `contract` for `delay`
    pub fn delay_reads(&self, contract: &str, delay: Duration) {
        self.read_delays.insert(contract.to_lowercase(), delay);
    }

    /// Revert every transaction calling `function`
    pub fn revert_on(&self, function: &str, reason: &str) {
        self.reverts.insert(function.to_string(), reason.to_string());
    }

    /// Record an event as if emitted on `chain_id`
    pub async fn log_event(&self, chain_id: u64, event: ChainEvent, topics: Vec<String>) {
        self.events.write().await.push(LoggedEvent { chain_id, event, topics });
    }

    /// Transactions accepted so far, oldest first
    pub async fn transactions(&self) -> Vec<SimulatedTransaction> {
        self.transactions.read().await.clone()
    }

    /// Number of view calls served
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<String> {
        if let Some(reason) = self.reverts.get(&tx.call.function) {
            return Err(revert_error(&tx.call, reason.value()));
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let seconds = self.clock.fetch_add(BLOCK_TIME_SECS, Ordering::SeqCst) + BLOCK_TIME_SECS;
        let timestamp = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| Error::TransactionSend(format!("clock out of range: {}", seconds)))?;
        let block_number = GENESIS_BLOCK + nonce;
        let tx_hash = transaction_hash(&tx, nonce);

        let topics: Vec<String> = tx
            .call
            .args
            .iter()
            .filter_map(|arg| arg.as_address().map(str::to_string))
            .collect();

        let event = ChainEvent {
            name: event_name(&tx.call.function),
            contract: tx.call.contract.clone(),
            account: tx.from.clone(),
            amount: tx.call.amount().unwrap_or_default().to_string(),
            tx_hash: tx_hash.clone(),
            block_number,
            timestamp,
        };

        debug!(tx_hash = %tx_hash, call = %tx.call, "Simulated transaction mined");

        self.log_event(tx.chain_id, event, topics).await;
        self.transactions.write().await.push(SimulatedTransaction {
            chain_id: tx.chain_id,
            from: tx.from,
            call: tx.call,
            tx_hash: tx_hash.clone(),
            block_number,
            timestamp,
        });

        Ok(tx_hash)
    }
}

#[async_trait]
impl ChainReader for SimulatedChain {
    async fn read(&self, chain_id: u64, call: &ContractCall) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let contract = call.contract.to_lowercase();

        let delay = self.read_delays.get(&contract).map(|d| *d.value());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.read_failures.get(&contract) {
            return Err(Error::ChainRead(format!("{}: {}", call, reason.value())));
        }

        match call.function.as_str() {
            "balanceOf" | "maxWithdraw" => {
                let owner = call
                    .args
                    .first()
                    .and_then(|arg| arg.as_address())
                    .ok_or_else(|| Error::ChainRead(format!("{}: missing owner", call)))?;
                let raw = self
                    .ledger
                    .get(&ledger_key(chain_id, &call.contract, owner))
                    .map(|v| *v.value())
                    .unwrap_or(0);
                Ok(raw.to_string())
            }
            other => Err(Error::ChainRead(format!("unsupported view {}", other))),
        }
    }

    async fn events(&self, chain_id: u64, query: &EventQuery) -> Result<Vec<ChainEvent>> {
        let events = self.events.read().await;

        Ok(events
            .iter()
            .filter(|logged| logged.chain_id == chain_id)
            .filter(|logged| same_address(&logged.event.contract, &query.contract))
            .filter(|logged| query.names.iter().any(|n| *n == logged.event.name))
            .filter(|logged| {
                same_address(&logged.event.account, &query.account)
                    || logged.topics.iter().any(|t| same_address(t, &query.account))
            })
            .filter(|logged| match &query.topic {
                Some(topic) => logged.topics.iter().any(|t| same_address(t, topic)),
                None => true,
            })
            .map(|logged| logged.event.clone())
            .collect())
    }
}

/// Wallet sending through a [`SimulatedChain`]
pub struct SimulatedWallet {
    chain: Arc<SimulatedChain>,
    address: String,
    chain_id: u64,
}

#[async_trait]
impl WalletCapability for SimulatedWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.address.as_bytes());
        hasher.update(message);
        Ok(to_hex(&hasher.finalize()))
    }

    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<SignedTransaction> {
        let raw = serde_json::to_string(tx)?;
        let hash = transaction_hash(tx, self.chain.nonce.load(Ordering::SeqCst));
        Ok(SignedTransaction { hash, raw })
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<String> {
        if tx.chain_id != self.chain_id {
            return Err(Error::TransactionSend(format!(
                "wallet signs for chain {}, request targets chain {}",
                self.chain_id, tx.chain_id
            )));
        }
        if !same_address(&tx.from, &self.address) {
            return Err(Error::TransactionSend(format!(
                "wallet {} cannot send from {}",
                self.address, tx.from
            )));
        }

        self.chain.submit(tx).await
    }
}

/// Map a revert reason onto the error the real chain service reports
fn revert_error(call: &ContractCall, reason: &str) -> Error {
    let detail = format!("{}: {}", call, reason);
    let lowered = reason.to_lowercase();

    if lowered.contains("slippage") {
        Error::SlippageExceeded(detail)
    } else if lowered.contains("liquidity") {
        Error::InsufficientLiquidity(detail)
    } else {
        Error::TransactionReverted(detail)
    }
}

fn ledger_key(chain_id: u64, contract: &str, owner: &str) -> LedgerKey {
    (chain_id, contract.to_lowercase(), owner.to_lowercase())
}

/// Event a vault entry point emits, named after the call
fn event_name(function: &str) -> String {
    // Comet's *To variants emit the plain Supply/Withdraw events
    let base = match function {
        "supplyTo" => "supply",
        "withdrawTo" => "withdraw",
        other => other,
    };

    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn transaction_hash(tx: &TransactionRequest, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tx.chain_id.to_be_bytes());
    hasher.update(tx.from.as_bytes());
    hasher.update(tx.call.to_string().as_bytes());
    hasher.update(nonce.to_be_bytes());
    format!("0x{}", to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CallArg;

    #[test]
    fn test_event_names() {
        assert_eq!(event_name("supply"), "Supply");
        assert_eq!(event_name("supplyTo"), "Supply");
        assert_eq!(event_name("withdrawTo"), "Withdraw");
        assert_eq!(event_name("mintPyFromToken"), "MintPyFromToken");
    }

    #[tokio::test]
    async fn test_balance_ledger_ignores_case() {
        let chain = SimulatedChain::new();
        chain.set_balance(1, "0xABC", "0xUser", 77);

        let call = ContractCall::balance_of("0xabc", "0xuser");
        assert_eq!(chain.read(1, &call).await.unwrap(), "77");
        assert_eq!(chain.read(2, &call).await.unwrap(), "0");
        assert_eq!(chain.read_count(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_view() {
        let chain = SimulatedChain::new();
        let call = ContractCall::new("0xabc", "totalSupply", vec![]);
        assert!(matches!(chain.read(1, &call).await, Err(Error::ChainRead(_))));
    }

    #[tokio::test]
    async fn test_send_records_and_emits() {
        let chain = SimulatedChain::new();
        let wallet = chain.wallet("0xuser", 1);

        let call = ContractCall::new("0xpool", "supply", vec![CallArg::address("0xasset"), CallArg::Uint(9)]);
        let first = wallet.send_transaction(TransactionRequest::new(1, "0xuser", call.clone())).await.unwrap();
        let second = wallet.send_transaction(TransactionRequest::new(1, "0xuser", call)).await.unwrap();
        assert_ne!(first, second);

        let sent = chain.transactions().await;
        assert_eq!(sent.len(), 2);
        assert!(sent[1].timestamp > sent[0].timestamp);

        let query = EventQuery {
            contract: "0xPOOL".to_string(),
            names: vec!["Supply".to_string()],
            account: "0xuser".to_string(),
            topic: Some("0xasset".to_string()),
        };
        let events = chain.events(1, &query).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].amount, "9");
    }

    #[tokio::test]
    async fn test_revert_and_wrong_chain() {
        let chain = SimulatedChain::new();
        let wallet = chain.wallet("0xuser", 1);
        chain.revert_on("withdraw", "paused");

        let call = ContractCall::new("0xpool", "withdraw", vec![CallArg::Uint(1)]);
        let reverted = wallet.send_transaction(TransactionRequest::new(1, "0xuser", call.clone())).await;
        assert!(matches!(reverted, Err(Error::TransactionReverted(_))));

        let wrong_chain = wallet.send_transaction(TransactionRequest::new(5, "0xuser", call)).await;
        assert!(matches!(wrong_chain, Err(Error::TransactionSend(_))));
        assert!(chain.transactions().await.is_empty());
    }

    #[test]
    fn test_revert_classification() {
        let call = ContractCall::new("0xrouter", "swap", vec![]);
        assert!(matches!(revert_error(&call, "Slippage: too high"), Error::SlippageExceeded(_)));
        assert!(matches!(
            revert_error(&call, "INSUFFICIENT_LIQUIDITY"),
            Error::InsufficientLiquidity(_)
        ));
        assert!(matches!(revert_error(&call, "paused"), Error::TransactionReverted(_)));
    }

    #[tokio::test]
    async fn test_signatures_are_deterministic() {
        let chain = SimulatedChain::new();
        let wallet = chain.wallet("0xuser", 1);

        let a = wallet.sign_message(b"hello").await.unwrap();
        let b = wallet.sign_message(b"hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
