//! Vault manager - the single entry point consumers depend on
//!
//! Resolves vault ids, dispatches to the registered protocol service and
//! aggregates balances and history across every protocol. Knows nothing
//! protocol-specific.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::ChainReader;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::ServiceRegistry;
use crate::vault::registry::VaultRegistry;
use crate::vault::types::{
    OperationKind, Protocol, ProtocolBalance, TransactionRecord, VaultOperationParams,
    VaultOperationResult,
};

/// Why a protocol is missing from an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    Failed,
}

/// One protocol's failure during a fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolFailure {
    pub protocol: Protocol,
    pub reason: FailureReason,
    pub message: String,
}

impl ProtocolFailure {
    fn new(protocol: Protocol, error: &Error) -> Self {
        let reason = match error {
            Error::Timeout { .. } => FailureReason::Timeout,
            _ => FailureReason::Failed,
        };
        Self {
            protocol,
            reason,
            message: error.to_string(),
        }
    }
}

/// Aggregate balance across protocols
#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalBalance {
    /// Sum of every answering protocol, each position scaled by its decimals
    pub total: Decimal,
    pub by_protocol: Vec<ProtocolBalance>,
    pub failures: Vec<ProtocolFailure>,
}

impl TotalBalance {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Merged history across protocols, newest first
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionFeed {
    pub transactions: Vec<TransactionRecord>,
    pub failures: Vec<ProtocolFailure>,
}

pub struct VaultManager {
    vaults: Arc<VaultRegistry>,
    services: Arc<ServiceRegistry>,
    fan_out_timeout: Duration,
}

impl VaultManager {
    pub fn new(vaults: Arc<VaultRegistry>, services: Arc<ServiceRegistry>, fan_out_timeout: Duration) -> Self {
        Self {
            vaults,
            services,
            fan_out_timeout,
        }
    }

    /// Build both registries from configuration
    ///
    /// Services are created without wallets; bind them afterwards.
    pub fn from_config(config: &Config, chain: Arc<dyn ChainReader>) -> Result<Self> {
        let vaults = VaultRegistry::from_config(config)?;
        let services = ServiceRegistry::from_vaults(&vaults, &config.network, chain)?;

        Ok(Self::new(
            Arc::new(vaults),
            Arc::new(services),
            config.manager.fan_out_timeout(),
        ))
    }

    pub fn vaults(&self) -> &VaultRegistry {
        &self.vaults
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Deposit `amount` of `asset_symbol` into `vault_id`
    ///
    /// `Err` only for usage errors (unknown vault, unwired protocol);
    /// everything else is a failed result.
    pub async fn deposit(&self, vault_id: &str, amount: &str, asset_symbol: &str) -> Result<VaultOperationResult> {
        self.dispatch(OperationKind::Deposit, vault_id, amount, asset_symbol, None)
            .await
    }

    pub async fn withdraw(&self, vault_id: &str, amount: &str, asset_symbol: &str) -> Result<VaultOperationResult> {
        self.dispatch(OperationKind::Withdraw, vault_id, amount, asset_symbol, None)
            .await
    }

    /// Deposit credited to `user_address` instead of the wallet
    pub async fn deposit_for(
        &self,
        vault_id: &str,
        amount: &str,
        asset_symbol: &str,
        user_address: &str,
    ) -> Result<VaultOperationResult> {
        self.dispatch(OperationKind::Deposit, vault_id, amount, asset_symbol, Some(user_address))
            .await
    }

    /// Withdraw paid out to `user_address` instead of the wallet
    pub async fn withdraw_to(
        &self,
        vault_id: &str,
        amount: &str,
        asset_symbol: &str,
        user_address: &str,
    ) -> Result<VaultOperationResult> {
        self.dispatch(OperationKind::Withdraw, vault_id, amount, asset_symbol, Some(user_address))
            .await
    }

    async fn dispatch(
        &self,
        kind: OperationKind,
        vault_id: &str,
        amount: &str,
        asset_symbol: &str,
        user_address: Option<&str>,
    ) -> Result<VaultOperationResult> {
        let market = self
            .vaults
            .resolve(vault_id)
            .ok_or_else(|| Error::UnknownVault(vault_id.to_string()))?;

        let protocol = market.protocol();
        let handle = self
            .services
            .get_service(protocol)
            .ok_or(Error::UnsupportedProtocol(protocol))?;

        if !market.matches_asset(asset_symbol) {
            let error = Error::AssetMismatch {
                vault_id: vault_id.to_string(),
                expected: market.symbol.clone(),
                requested: asset_symbol.to_string(),
            };
            warn!(protocol = %protocol, vault_id, error = %error, "Vault {} rejected", kind);
            return Ok(VaultOperationResult::failed(&error));
        }

        info!(protocol = %protocol, vault_id, amount, "Dispatching vault {}", kind);

        let mut params = VaultOperationParams::new(market, amount);
        if let Some(user) = user_address {
            params = params.with_user(user);
        }

        let service = handle.service();
        Ok(match kind {
            OperationKind::Deposit => service.deposit(params).await,
            OperationKind::Withdraw => service.withdraw(params).await,
        })
    }

    /// Sum of `user_address`'s positions over every registered protocol
    ///
    /// Protocols that fail or exceed the fan-out timeout are listed in
    /// `failures`; the call only errors when none answered.
    pub async fn get_total_balance(&self, user_address: &str) -> Result<TotalBalance> {
        let start = Instant::now();
        let handles = self.services.services();

        let calls = handles.iter().map(|handle| {
            let protocol = handle.protocol();
            let service = handle.service();
            async move {
                let outcome = self.bounded(protocol, service.get_balance(user_address)).await;
                (protocol, outcome)
            }
        });

        let mut result = TotalBalance::default();
        for (protocol, outcome) in join_all(calls).await {
            match outcome.and_then(|balance| Ok((balance.total()?, balance))) {
                Ok((total, balance)) => {
                    result.total += total;
                    result.by_protocol.push(balance);
                }
                Err(e) => {
                    warn!(protocol = %protocol, error = %e, "Balance unavailable");
                    result.failures.push(ProtocolFailure::new(protocol, &e));
                }
            }
        }

        if !handles.is_empty() && result.by_protocol.is_empty() {
            return Err(Error::NoProtocolResponded {
                failures: result.failures,
            });
        }

        debug!(
            user = user_address,
            total = %result.total,
            protocols = result.by_protocol.len(),
            failed = result.failures.len(),
            latency_ms = %start.elapsed().as_millis(),
            "Total balance aggregated"
        );

        Ok(result)
    }

    /// Every protocol's history merged, newest first
    ///
    /// Equal timestamps are ordered by protocol tag; records repeated by a
    /// protocol (same vault, hash and kind) appear once.
    pub async fn get_all_transactions(&self, user_address: &str) -> Result<TransactionFeed> {
        let handles = self.services.services();

        let calls = handles.iter().map(|handle| {
            let protocol = handle.protocol();
            let service = handle.service();
            async move {
                let outcome = self
                    .bounded(protocol, service.get_transaction_history(user_address))
                    .await;
                (protocol, outcome)
            }
        });

        let mut feed = TransactionFeed::default();
        let mut seen = HashSet::new();
        let mut answered = 0;

        for (protocol, outcome) in join_all(calls).await {
            match outcome {
                Ok(records) => {
                    answered += 1;
                    for record in records {
                        let key = (
                            record.protocol,
                            record.vault_id.clone(),
                            record.tx_hash.clone(),
                            record.kind,
                        );
                        if seen.insert(key) {
                            feed.transactions.push(record);
                        }
                    }
                }
                Err(e) => {
                    warn!(protocol = %protocol, error = %e, "History unavailable");
                    feed.failures.push(ProtocolFailure::new(protocol, &e));
                }
            }
        }

        if !handles.is_empty() && answered == 0 {
            return Err(Error::NoProtocolResponded {
                failures: feed.failures,
            });
        }

        // Stable: each protocol's own order survives within a timestamp
        feed.transactions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(a.protocol.cmp(&b.protocol))
        });

        debug!(
            user = user_address,
            transactions = feed.transactions.len(),
            failed = feed.failures.len(),
            "Transaction history merged"
        );

        Ok(feed)
    }

    async fn bounded<T>(&self, protocol: Protocol, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.fan_out_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout {
                protocol,
                timeout_ms: self.fan_out_timeout.as_millis() as u64,
            }),
        }
    }
}
