//! Chain access - read-only queries and call descriptions
//!
//! The router never encodes ABI data itself. Contract interactions are
//! described as [`ContractCall`]s and handed to the external chain reader
//! (for views) or wallet (for transactions), which own encoding and RPC.

pub mod simulated;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use simulated::{SimulatedChain, SimulatedWallet};

/// Argument of a contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArg {
    Address(String),
    Uint(u128),
}

impl CallArg {
    pub fn address(value: impl Into<String>) -> Self {
        CallArg::Address(value.into())
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            CallArg::Address(a) => Some(a),
            CallArg::Uint(_) => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            CallArg::Uint(v) => Some(*v),
            CallArg::Address(_) => None,
        }
    }
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArg::Address(a) => write!(f, "{}", a),
            CallArg::Uint(v) => write!(f, "{}", v),
        }
    }
}

/// A contract function invocation, for either a view or a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract: String,
    pub function: String,
    pub args: Vec<CallArg>,
}

impl ContractCall {
    pub fn new(contract: impl Into<String>, function: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            contract: contract.into(),
            function: function.into(),
            args,
        }
    }

    /// ERC-20 `approve(spender, amount)` on `token`
    pub fn approve(token: &str, spender: &str, amount: u128) -> Self {
        Self::new(
            token,
            "approve",
            vec![CallArg::address(spender), CallArg::Uint(amount)],
        )
    }

    /// ERC-20 style `balanceOf(owner)`
    pub fn balance_of(token: &str, owner: &str) -> Self {
        Self::new(token, "balanceOf", vec![CallArg::address(owner)])
    }

    /// First unsigned integer argument, which is the amount for every
    /// vault entry point we build
    pub fn amount(&self) -> Option<u128> {
        self.args.iter().find_map(CallArg::as_uint)
    }
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        write!(f, "{}.{}({})", self.contract, self.function, args.join(", "))
    }
}

/// Filter for historical contract events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Emitting contract
    pub contract: String,
    /// Event names of interest ("Supply", "Withdraw", ...)
    pub names: Vec<String>,
    /// Indexed user address (owner / onBehalfOf / receiver)
    pub account: String,
    /// Additional indexed address narrowing the query (e.g. Pendle YT)
    pub topic: Option<String>,
}

/// Decoded event returned by the chain reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub name: String,
    pub contract: String,
    pub account: String,
    /// Base units as a decimal string
    pub amount: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Read-only chain access, independent of any wallet
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute a view call, returning the (single) result as a decimal string
    async fn read(&self, chain_id: u64, call: &ContractCall) -> Result<String>;

    /// Fetch events matching `query`, in any order
    async fn events(&self, chain_id: u64, query: &EventQuery) -> Result<Vec<ChainEvent>>;
}

/// Compare addresses ignoring hex case
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_display() {
        let call = ContractCall::approve("0xtoken", "0xspender", 42);
        assert_eq!(call.to_string(), "0xtoken.approve(0xspender, 42)");
        assert_eq!(call.amount(), Some(42));
    }

    #[test]
    fn test_same_address_ignores_case() {
        assert!(same_address("0xAbC", "0xabc"));
        assert!(!same_address("0xabc", "0xabd"));
    }
}
