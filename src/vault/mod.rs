//! Vault layer - market definitions, amounts and the manager facade
//!
//! ```text
//! VaultManager → VaultRegistry (vault id → market)
//!              → ServiceRegistry (protocol → service) → ProtocolService
//! ```

pub mod amount;
pub mod manager;
pub mod registry;
pub mod types;

pub use manager::{FailureReason, ProtocolFailure, TotalBalance, TransactionFeed, VaultManager};
pub use registry::VaultRegistry;
pub use types::{
    FailureKind, MarketDetails, Protocol, VaultMarketInfo, VaultOperationParams,
    VaultOperationResult, VaultServiceConfig,
};
