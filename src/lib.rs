//! Vault Router Library
//!
//! One deposit/withdraw/balance/history surface over Aave, Compound,
//! Morpho and Pendle, with wallets injected after the services are built.

pub mod account;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod vault;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{ServiceHandle, ServiceRegistry};
pub use vault::{Protocol, VaultManager, VaultOperationResult};
