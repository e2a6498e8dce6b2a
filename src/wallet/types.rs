//! Transaction request/response shapes exchanged with the wallet service

use serde::{Deserialize, Serialize};

use crate::chain::ContractCall;

/// Unsigned transaction handed to a wallet capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub chain_id: u64,

    /// Sender address
    pub from: String,

    /// Target call; the wallet service encodes it
    pub call: ContractCall,

    /// Native value attached, in wei
    #[serde(default)]
    pub value: u128,
}

impl TransactionRequest {
    pub fn new(chain_id: u64, from: impl Into<String>, call: ContractCall) -> Self {
        Self {
            chain_id,
            from: from.into(),
            call,
            value: 0,
        }
    }
}

/// Signed but not yet broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub hash: String,

    /// Opaque serialized payload
    pub raw: String,
}
