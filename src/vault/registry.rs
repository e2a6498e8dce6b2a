//! Vault registry - static vault id to market mapping, loaded once
//!
//! Also maps (protocol, network) to the service configuration the
//! protocol registry is built from. Read-only after construction.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{Config, VaultEntry};
use crate::error::{Error, Result};
use crate::vault::amount::MAX_DECIMALS;
use crate::vault::types::{MarketDetails, Protocol, VaultMarketInfo, VaultServiceConfig};

lazy_static::lazy_static! {
    static ref VAULT_ID: Regex =
        Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("Invalid vault id pattern");
    static ref ADDRESS: Regex =
        Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Invalid address pattern");
}

#[derive(Debug, Default)]
pub struct VaultRegistry {
    /// Definition order is kept for listing
    markets: Vec<Arc<VaultMarketInfo>>,
    by_id: HashMap<String, Arc<VaultMarketInfo>>,
    service_configs: Vec<VaultServiceConfig>,
}

impl VaultRegistry {
    /// Build from already-typed markets, validating every entry
    pub fn new(markets: Vec<VaultMarketInfo>, service_configs: Vec<VaultServiceConfig>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(markets.len());
        let mut shared = Vec::with_capacity(markets.len());

        for market in markets {
            validate_market(&market)?;

            let market = Arc::new(market);
            if by_id.insert(market.vault_id.clone(), Arc::clone(&market)).is_some() {
                return Err(Error::Config(format!("duplicate vault id {:?}", market.vault_id)));
            }
            shared.push(market);
        }

        let mut seen = HashSet::new();
        for config in &service_configs {
            if !seen.insert((config.protocol, config.network.clone())) {
                return Err(Error::Config(format!(
                    "more than one {} service configured for network {}",
                    config.protocol, config.network
                )));
            }
        }

        debug!(
            vaults = shared.len(),
            services = service_configs.len(),
            "Vault registry loaded"
        );

        Ok(Self {
            markets: shared,
            by_id,
            service_configs,
        })
    }

    /// Build from the `[[vaults]]` and `[[services]]` tables
    pub fn from_config(config: &Config) -> Result<Self> {
        let markets = config
            .vaults
            .iter()
            .map(market_from_entry)
            .collect::<Result<Vec<_>>>()?;

        Self::new(markets, config.services.clone())
    }

    /// Market for `vault_id`, if defined
    pub fn resolve(&self, vault_id: &str) -> Option<Arc<VaultMarketInfo>> {
        self.by_id.get(vault_id).cloned()
    }

    /// All markets in definition order
    pub fn vaults(&self) -> &[Arc<VaultMarketInfo>] {
        &self.markets
    }

    pub fn markets_for(&self, protocol: Protocol, chain_id: u64) -> Vec<Arc<VaultMarketInfo>> {
        self.markets
            .iter()
            .filter(|m| m.protocol() == protocol && m.chain_id == chain_id)
            .cloned()
            .collect()
    }

    pub fn service_config(&self, protocol: Protocol, network: &str) -> Option<&VaultServiceConfig> {
        self.service_configs
            .iter()
            .find(|c| c.protocol == protocol && c.network == network)
    }

    /// Service configurations of `network`, ordered by protocol tag
    pub fn service_configs_for(&self, network: &str) -> Vec<&VaultServiceConfig> {
        let mut configs: Vec<_> = self
            .service_configs
            .iter()
            .filter(|c| c.network == network)
            .collect();
        configs.sort_by_key(|c| c.protocol);
        configs
    }

    pub fn service_configs(&self) -> &[VaultServiceConfig] {
        &self.service_configs
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

fn validate_market(market: &VaultMarketInfo) -> Result<()> {
    if !VAULT_ID.is_match(&market.vault_id) {
        return Err(Error::Config(format!(
            "invalid vault id {:?}: expected lowercase words joined by '-'",
            market.vault_id
        )));
    }

    if market.decimals > MAX_DECIMALS {
        return Err(Error::Config(format!(
            "vault {}: {} decimals exceeds {}",
            market.vault_id, market.decimals, MAX_DECIMALS
        )));
    }

    if market.symbol.trim().is_empty() {
        return Err(Error::Config(format!("vault {}: empty symbol", market.vault_id)));
    }

    let mut addresses = vec![
        ("asset_address", market.asset_address.as_str()),
        ("market_address", market.market_address.as_str()),
    ];
    match &market.details {
        MarketDetails::Aave { a_token, data_provider } => {
            addresses.push(("a_token", a_token.as_str()));
            if let Some(provider) = data_provider {
                addresses.push(("data_provider", provider.as_str()));
            }
        }
        MarketDetails::Compound { base_token, rewards } => {
            if let Some(base) = base_token {
                addresses.push(("base_token", base.as_str()));
            }
            if let Some(rewards) = rewards {
                addresses.push(("rewards", rewards.as_str()));
            }
        }
        MarketDetails::Pendle { router, pt, yt, sy } => {
            addresses.push(("router", router.as_str()));
            addresses.push(("pt", pt.as_str()));
            addresses.push(("yt", yt.as_str()));
            if let Some(sy) = sy {
                addresses.push(("sy", sy.as_str()));
            }
        }
        MarketDetails::Morpho { .. } => {}
    }

    for (field, address) in addresses {
        if !ADDRESS.is_match(address) {
            return Err(Error::Config(format!(
                "vault {}: {} {:?} is not a 0x-prefixed 20-byte address",
                market.vault_id, field, address
            )));
        }
    }

    Ok(())
}

/// Keep the sub-record matching the protocol; warn about the others
fn market_from_entry(entry: &VaultEntry) -> Result<VaultMarketInfo> {
    let foreign: Vec<&str> = [
        (Protocol::Aave, entry.aave.is_some()),
        (Protocol::Compound, entry.compound.is_some()),
        (Protocol::Morpho, entry.morpho.is_some()),
        (Protocol::Pendle, entry.pendle.is_some()),
    ]
    .iter()
    .filter(|(protocol, present)| *present && *protocol != entry.protocol)
    .map(|(protocol, _)| protocol.as_str())
    .collect();

    if !foreign.is_empty() {
        warn!(
            vault_id = %entry.id,
            protocol = %entry.protocol,
            ignored = ?foreign,
            "Ignoring sub-records of other protocols"
        );
    }

    let missing = |table: &str| {
        Error::Config(format!(
            "vault {}: protocol {} requires a [vaults.{}] table",
            entry.id, entry.protocol, table
        ))
    };

    let details = match entry.protocol {
        Protocol::Aave => {
            let aave = entry.aave.as_ref().ok_or_else(|| missing("aave"))?;
            MarketDetails::Aave {
                a_token: aave.a_token.clone(),
                data_provider: aave.data_provider.clone(),
            }
        }
        Protocol::Compound => {
            let compound = entry.compound.clone().unwrap_or_default();
            MarketDetails::Compound {
                base_token: compound.base_token,
                rewards: compound.rewards,
            }
        }
        Protocol::Morpho => {
            let morpho = entry.morpho.clone().unwrap_or_default();
            MarketDetails::Morpho {
                market_id: morpho.market_id,
            }
        }
        Protocol::Pendle => {
            let pendle = entry.pendle.as_ref().ok_or_else(|| missing("pendle"))?;
            MarketDetails::Pendle {
                router: pendle.router.clone(),
                pt: pendle.pt.clone(),
                yt: pendle.yt.clone(),
                sy: pendle.sy.clone(),
            }
        }
    };

    Ok(VaultMarketInfo {
        vault_id: entry.id.clone(),
        asset_address: entry.asset_address.clone(),
        market_address: entry.market_address.clone(),
        chain_id: entry.chain_id,
        network: entry.network.clone(),
        decimals: entry.decimals,
        symbol: entry.symbol.clone(),
        details,
    })
}
