//! Logic shared by every protocol service: market checks, submission,
//! result normalization, balance and history reads

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::chain::{ChainReader, ContractCall, EventQuery};
use crate::error::{Error, Result};
use crate::vault::amount;
use crate::vault::types::{
    OperationKind, PositionBalance, Protocol, ProtocolBalance, TransactionKind, TransactionRecord,
    VaultMarketInfo, VaultOperationParams, VaultOperationResult, VaultServiceConfig,
};
use crate::wallet::{send_sequence, WalletCapability};

/// On-chain event names a protocol emits for deposits and withdrawals
pub(crate) struct EventNames {
    pub deposit: &'static str,
    pub withdraw: &'static str,
}

impl EventNames {
    fn kind_of(&self, name: &str) -> Option<TransactionKind> {
        if name == self.deposit {
            Some(TransactionKind::Deposit)
        } else if name == self.withdraw {
            Some(TransactionKind::Withdraw)
        } else {
            None
        }
    }

    pub fn query(&self, contract: &str, account: &str, topic: Option<&str>) -> EventQuery {
        EventQuery {
            contract: contract.to_string(),
            names: vec![self.deposit.to_string(), self.withdraw.to_string()],
            account: account.to_string(),
            topic: topic.map(str::to_string),
        }
    }
}

pub(crate) struct ServiceCore {
    config: VaultServiceConfig,
    markets: Vec<Arc<VaultMarketInfo>>,
    chain: Arc<dyn ChainReader>,
}

impl ServiceCore {
    /// Keep only the markets of this protocol on this service's chain
    pub fn new(
        config: VaultServiceConfig,
        markets: impl IntoIterator<Item = Arc<VaultMarketInfo>>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        let markets: Vec<_> = markets
            .into_iter()
            .filter(|m| m.protocol() == config.protocol && m.chain_id == config.chain_id)
            .collect();

        debug!(
            protocol = %config.protocol,
            network = %config.network,
            markets = markets.len(),
            "Protocol service created"
        );

        Self { config, markets, chain }
    }

    pub fn config(&self) -> &VaultServiceConfig {
        &self.config
    }

    pub fn protocol(&self) -> Protocol {
        self.config.protocol
    }

    /// Check the market belongs to this service and convert the amount to base units
    pub fn prepare(&self, params: &VaultOperationParams) -> Result<u128> {
        let market = &params.market;

        if market.protocol() != self.protocol() {
            return Err(self.execution_error(format!(
                "vault {} belongs to {}",
                market.vault_id,
                market.protocol()
            )));
        }

        if market.chain_id != self.config.chain_id {
            return Err(self.execution_error(format!(
                "vault {} is on chain {}, service runs on chain {}",
                market.vault_id, market.chain_id, self.config.chain_id
            )));
        }

        amount::to_base_units(&params.amount, market.decimals)
    }

    pub async fn submit<W>(&self, wallet: &W, calls: Vec<ContractCall>) -> Result<String>
    where
        W: WalletCapability + ?Sized,
    {
        send_sequence(wallet, calls).await
    }

    /// Turn an execution outcome into the uniform result, logging it
    pub fn settle(
        &self,
        kind: OperationKind,
        params: &VaultOperationParams,
        outcome: Result<String>,
    ) -> VaultOperationResult {
        match outcome {
            Ok(tx_hash) => {
                info!(
                    protocol = %self.protocol(),
                    vault_id = %params.market.vault_id,
                    amount = %params.amount,
                    tx_hash = %tx_hash,
                    "Vault {} confirmed",
                    kind
                );
                VaultOperationResult::succeeded(tx_hash)
            }
            Err(e) => {
                let error = self.normalize(e);
                warn!(
                    protocol = %self.protocol(),
                    vault_id = %params.market.vault_id,
                    amount = %params.amount,
                    error = %error,
                    "Vault {} failed",
                    kind
                );
                VaultOperationResult::failed(&error)
            }
        }
    }

    /// Positions of `user` across all markets, one view call per market
    pub async fn balances<F>(&self, user: &str, view: F) -> Result<ProtocolBalance>
    where
        F: Fn(&VaultMarketInfo, &str) -> ContractCall,
    {
        let reads = self.markets.iter().map(|market| {
            let call = view(market, user);
            async move {
                let raw = self.chain.read(self.config.chain_id, &call).await?;
                Ok::<_, Error>(PositionBalance {
                    vault_id: market.vault_id.clone(),
                    symbol: market.symbol.clone(),
                    raw: raw.trim().to_string(),
                    decimals: market.decimals,
                })
            }
        });

        let positions = try_join_all(reads).await?;

        debug!(protocol = %self.protocol(), user, positions = positions.len(), "Balances read");

        Ok(ProtocolBalance {
            protocol: self.protocol(),
            positions,
        })
    }

    /// Deposit/withdraw history of `user`, newest first
    pub async fn history<F>(&self, user: &str, names: &EventNames, query: F) -> Result<Vec<TransactionRecord>>
    where
        F: Fn(&VaultMarketInfo, &str) -> EventQuery,
    {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for market in &self.markets {
            let events = self
                .chain
                .events(self.config.chain_id, &query(market, user))
                .await?;

            for event in events {
                let Some(kind) = names.kind_of(&event.name) else {
                    continue;
                };

                if !seen.insert((event.tx_hash.clone(), kind, market.vault_id.clone())) {
                    continue;
                }

                let normalized = match amount::from_base_units(&event.amount, market.decimals) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(
                            protocol = %self.protocol(),
                            vault_id = %market.vault_id,
                            tx_hash = %event.tx_hash,
                            error = %e,
                            "Skipping event with malformed amount"
                        );
                        continue;
                    }
                };

                records.push(TransactionRecord {
                    protocol: self.protocol(),
                    vault_id: market.vault_id.clone(),
                    kind,
                    amount: normalized,
                    raw_amount: event.amount,
                    symbol: market.symbol.clone(),
                    tx_hash: event.tx_hash,
                    block_number: event.block_number,
                    timestamp: event.timestamp,
                });
            }
        }

        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.block_number.cmp(&a.block_number))
        });

        Ok(records)
    }

    fn execution_error(&self, message: String) -> Error {
        Error::ProtocolExecution {
            protocol: self.protocol(),
            message,
        }
    }

    /// Wrap collaborator failures as protocol execution errors, keeping the
    /// conditions callers distinguish
    fn normalize(&self, error: Error) -> Error {
        match error {
            Error::WalletNotReady(_) | Error::InvalidAmount(_) | Error::ProtocolExecution { .. } => error,
            other => self.execution_error(other.to_string()),
        }
    }
}
