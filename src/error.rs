//! Error types for the vault router

use thiserror::Error;

use crate::vault::types::Protocol;
use crate::vault::ProtocolFailure;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vault router
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol service already registered: {0}")]
    DuplicateService(Protocol),

    // Lookup errors (caller usage)
    #[error("Unknown vault: {0}")]
    UnknownVault(String),

    #[error("No service registered for protocol {0}")]
    UnsupportedProtocol(Protocol),

    #[error("Vault {vault_id} holds {expected}, not {requested}")]
    AssetMismatch {
        vault_id: String,
        expected: String,
        requested: String,
    },

    // Execution errors
    #[error("Wallet not ready for {0}")]
    WalletNotReady(Protocol),

    #[error("{protocol} execution failed: {message}")]
    ProtocolExecution { protocol: Protocol, message: String },

    #[error("{protocol} did not respond within {timeout_ms}ms")]
    Timeout { protocol: Protocol, timeout_ms: u64 },

    #[error("No protocol responded ({} failed)", failures.len())]
    NoProtocolResponded { failures: Vec<ProtocolFailure> },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Collaborator errors
    #[error("Chain read failed: {0}")]
    ChainRead(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Slippage exceeded: {0}")]
    SlippageExceeded(String),

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error comes from a bad request rather than the chain
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownVault(_)
                | Error::UnsupportedProtocol(_)
                | Error::AssetMismatch { .. }
                | Error::InvalidAmount(_)
        )
    }

    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ChainRead(_)
                | Error::TransactionSend(_)
                | Error::Timeout { .. }
                | Error::WalletNotReady(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors() {
        assert!(Error::UnknownVault("nope".to_string()).is_usage_error());
        assert!(Error::UnsupportedProtocol(Protocol::Morpho).is_usage_error());
        assert!(!Error::WalletNotReady(Protocol::Aave).is_usage_error());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Timeout { protocol: Protocol::Pendle, timeout_ms: 10 }.is_retryable());
        assert!(!Error::TransactionReverted("paused".to_string()).is_retryable());
    }

    #[test]
    fn test_display_names_protocol() {
        let err = Error::ProtocolExecution {
            protocol: Protocol::Compound,
            message: "reverted".to_string(),
        };
        assert_eq!(err.to_string(), "compound execution failed: reverted");
        assert_eq!(Error::WalletNotReady(Protocol::Aave).to_string(), "Wallet not ready for aave");
    }
}
