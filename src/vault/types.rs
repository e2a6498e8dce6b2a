//! Core types for vault routing
//!
//! Defines protocol tags, market descriptions, operation params/results,
//! balances and transaction records.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vault::amount;

/// Supported lending/yield protocol
///
/// Declared in lexical order of the tag so the derived `Ord` matches
/// ordering by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Aave,
    Compound,
    Morpho,
    Pendle,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Aave,
        Protocol::Compound,
        Protocol::Morpho,
        Protocol::Pendle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Aave => "aave",
            Protocol::Compound => "compound",
            Protocol::Morpho => "morpho",
            Protocol::Pendle => "pendle",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "aave" => Ok(Protocol::Aave),
            "compound" => Ok(Protocol::Compound),
            "morpho" => Ok(Protocol::Morpho),
            "pendle" => Ok(Protocol::Pendle),
            other => Err(Error::Config(format!("Unknown protocol: {}", other))),
        }
    }
}

/// Protocol-specific addresses of a market
///
/// The variant always matches the market's protocol, so fields of other
/// protocols cannot be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum MarketDetails {
    Aave {
        /// Interest-bearing aToken held by suppliers
        a_token: String,
        data_provider: Option<String>,
    },
    Compound {
        base_token: Option<String>,
        rewards: Option<String>,
    },
    Morpho {
        market_id: Option<String>,
    },
    Pendle {
        router: String,
        pt: String,
        yt: String,
        sy: Option<String>,
    },
}

impl MarketDetails {
    pub fn protocol(&self) -> Protocol {
        match self {
            MarketDetails::Aave { .. } => Protocol::Aave,
            MarketDetails::Compound { .. } => Protocol::Compound,
            MarketDetails::Morpho { .. } => Protocol::Morpho,
            MarketDetails::Pendle { .. } => Protocol::Pendle,
        }
    }
}

/// Immutable description of one addressable market
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultMarketInfo {
    /// Stable vault key: "aave-usdc"
    pub vault_id: String,

    /// Underlying asset (ERC-20) address
    pub asset_address: String,

    /// Primary market contract: Aave pool, Compound comet, Pendle market, Morpho vault
    pub market_address: String,

    pub chain_id: u64,

    pub network: String,

    pub decimals: u8,

    pub symbol: String,

    pub details: MarketDetails,
}

impl VaultMarketInfo {
    pub fn protocol(&self) -> Protocol {
        self.details.protocol()
    }

    /// Contract whose balance represents the user's position
    pub fn position_token(&self) -> &str {
        match &self.details {
            MarketDetails::Aave { a_token, .. } => a_token,
            MarketDetails::Pendle { pt, .. } => pt,
            MarketDetails::Compound { .. } | MarketDetails::Morpho { .. } => &self.market_address,
        }
    }

    /// Check whether `symbol` names this market's asset (case-insensitive)
    pub fn matches_asset(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol.trim())
    }
}

/// Protocol + network selection used to build one protocol service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultServiceConfig {
    pub protocol: Protocol,
    pub network: String,
    pub chain_id: u64,
    /// Tolerated deviation for min-out bounds, in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
}

fn default_slippage_bps() -> u32 {
    50
}

impl VaultServiceConfig {
    pub fn new(protocol: Protocol, network: impl Into<String>, chain_id: u64) -> Self {
        Self {
            protocol,
            network: network.into(),
            chain_id,
            slippage_bps: default_slippage_bps(),
        }
    }
}

/// Input to a deposit/withdraw call
#[derive(Debug, Clone)]
pub struct VaultOperationParams {
    pub market: Arc<VaultMarketInfo>,
    /// Human-readable decimal amount ("12.5"), never a float
    pub amount: String,
    /// Receiver / on-behalf-of override; defaults to the wallet address
    pub user_address: Option<String>,
}

impl VaultOperationParams {
    pub fn new(market: Arc<VaultMarketInfo>, amount: impl Into<String>) -> Self {
        Self {
            market,
            amount: amount.into(),
            user_address: None,
        }
    }

    pub fn with_user(mut self, user_address: impl Into<String>) -> Self {
        self.user_address = Some(user_address.into());
        self
    }
}

/// Which state-changing operation is being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Deposit => write!(f, "deposit"),
            OperationKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Category of a failed operation, for callers that need more than the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    WalletNotReady,
    InvalidRequest,
    ProtocolExecution,
}

impl FailureKind {
    fn of(error: &Error) -> Self {
        match error {
            Error::WalletNotReady(_) => FailureKind::WalletNotReady,
            Error::InvalidAmount(_)
            | Error::AssetMismatch { .. }
            | Error::UnknownVault(_)
            | Error::UnsupportedProtocol(_) => FailureKind::InvalidRequest,
            _ => FailureKind::ProtocolExecution,
        }
    }
}

/// Outcome of a deposit/withdraw
///
/// Exactly one of `tx_hash` and `error` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultOperationResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    failure: Option<FailureKind>,
}

impl VaultOperationResult {
    pub fn succeeded(tx_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash.into()),
            error: None,
            failure: None,
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            tx_hash: None,
            error: Some(error.to_string()),
            failure: Some(FailureKind::of(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }
}

impl From<Result<String>> for VaultOperationResult {
    fn from(outcome: Result<String>) -> Self {
        match outcome {
            Ok(tx_hash) => Self::succeeded(tx_hash),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Balance of one market position, in the asset's native base units
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionBalance {
    pub vault_id: String,
    pub symbol: String,
    /// Integer decimal string of base units
    pub raw: String,
    pub decimals: u8,
}

impl PositionBalance {
    /// Balance scaled down by the asset's decimals
    pub fn amount(&self) -> Result<Decimal> {
        amount::from_base_units(&self.raw, self.decimals)
    }
}

/// All positions of one protocol for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolBalance {
    pub protocol: Protocol,
    pub positions: Vec<PositionBalance>,
}

impl ProtocolBalance {
    /// Sum of positions after decimal normalization
    pub fn total(&self) -> Result<Decimal> {
        self.positions
            .iter()
            .try_fold(Decimal::ZERO, |acc, p| Ok(acc + p.amount()?))
    }
}

/// Direction of a historical vault transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// One historical deposit/withdraw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub protocol: Protocol,
    pub vault_id: String,
    pub kind: TransactionKind,
    /// Human-readable amount
    pub amount: Decimal,
    /// Base units as reported by the chain
    pub raw_amount: String,
    pub symbol: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse_and_order() {
        assert_eq!("Pendle".parse::<Protocol>().unwrap(), Protocol::Pendle);
        assert!("euler".parse::<Protocol>().is_err());

        let mut tags = vec![Protocol::Pendle, Protocol::Morpho, Protocol::Aave, Protocol::Compound];
        tags.sort();
        let names: Vec<_> = tags.iter().map(|p| p.as_str()).collect();
        let mut lexical = names.clone();
        lexical.sort();
        assert_eq!(names, lexical);
    }

    #[test]
    fn test_protocol_serde() {
        let json = serde_json::to_string(&Protocol::Compound).unwrap();
        assert_eq!(json, r#""compound""#);
        let parsed: Protocol = serde_json::from_str(r#""morpho""#).unwrap();
        assert_eq!(parsed, Protocol::Morpho);
    }

    #[test]
    fn test_operation_result_exclusive_fields() {
        let ok = VaultOperationResult::succeeded("0xabc");
        assert!(ok.is_success());
        assert_eq!(ok.tx_hash(), Some("0xabc"));
        assert!(ok.error().is_none());

        let failed = VaultOperationResult::failed(&Error::WalletNotReady(Protocol::Aave));
        assert!(!failed.is_success());
        assert!(failed.tx_hash().is_none());
        assert_eq!(failed.error(), Some("Wallet not ready for aave"));
        assert_eq!(failed.failure_kind(), Some(FailureKind::WalletNotReady));
    }

    #[test]
    fn test_operation_result_serialization() {
        let json = serde_json::to_value(VaultOperationResult::succeeded("0x01")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "txHash": "0x01" }));

        let err = Error::SlippageExceeded("min out".to_string());
        let json = serde_json::to_value(VaultOperationResult::failed(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("txHash").is_none());
        assert_eq!(json["error"], "Slippage exceeded: min out");
    }

    #[test]
    fn test_protocol_balance_total_normalizes_decimals() {
        let balance = ProtocolBalance {
            protocol: Protocol::Aave,
            positions: vec![
                PositionBalance {
                    vault_id: "aave-usdc".to_string(),
                    symbol: "USDC".to_string(),
                    raw: "1500000".to_string(),
                    decimals: 6,
                },
                PositionBalance {
                    vault_id: "aave-dai".to_string(),
                    symbol: "DAI".to_string(),
                    raw: "2000000000000000000".to_string(),
                    decimals: 18,
                },
            ],
        };
        assert_eq!(balance.total().unwrap(), Decimal::new(35, 1));
    }
}
