//! Account identities linked to a user
//!
//! Each kind carries only its own field, so callers match on the variant
//! instead of probing for whichever field happens to be set.

use serde::{Deserialize, Serialize};

/// One linked identity of a user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountIdentity {
    Phone { number: String },
    Email { address: String },
    Wallet { address: String, chain_id: Option<u64> },
    Twitter { handle: String },
    Tiktok { handle: String },
    Custom { provider: String, subject: String },
}

impl AccountIdentity {
    /// The identifier shown for this account
    pub fn main_identifier(&self) -> String {
        match self {
            AccountIdentity::Phone { number } => number.clone(),
            AccountIdentity::Email { address } => address.clone(),
            AccountIdentity::Wallet { address, .. } => address.clone(),
            AccountIdentity::Twitter { handle } | AccountIdentity::Tiktok { handle } => {
                format!("@{}", handle.trim_start_matches('@'))
            }
            AccountIdentity::Custom { provider, subject } => format!("{}:{}", provider, subject),
        }
    }

    /// Address usable with the vault manager, if this is a wallet identity
    pub fn wallet_address(&self) -> Option<&str> {
        match self {
            AccountIdentity::Wallet { address, .. } => Some(address),
            _ => None,
        }
    }
}

/// First wallet address among `identities`
pub fn primary_wallet(identities: &[AccountIdentity]) -> Option<&str> {
    identities.iter().find_map(AccountIdentity::wallet_address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_identifier_per_kind() {
        let twitter = AccountIdentity::Twitter { handle: "@vaults".to_string() };
        let tiktok = AccountIdentity::Tiktok { handle: "vaults".to_string() };
        let custom = AccountIdentity::Custom {
            provider: "github".to_string(),
            subject: "42".to_string(),
        };

        assert_eq!(twitter.main_identifier(), "@vaults");
        assert_eq!(tiktok.main_identifier(), "@vaults");
        assert_eq!(custom.main_identifier(), "github:42");
    }

    #[test]
    fn test_primary_wallet() {
        let identities = vec![
            AccountIdentity::Email { address: "a@b.c".to_string() },
            AccountIdentity::Wallet { address: "0xabc".to_string(), chain_id: Some(8453) },
        ];
        assert_eq!(primary_wallet(&identities), Some("0xabc"));
        assert_eq!(primary_wallet(&identities[..1]), None);
    }

    #[test]
    fn test_tagged_serialization() {
        let phone: AccountIdentity = serde_json::from_str(r#"{"kind":"phone","number":"+15550100"}"#).unwrap();
        assert_eq!(phone.main_identifier(), "+15550100");

        let json = serde_json::to_value(AccountIdentity::Email { address: "x@y.z".to_string() }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "email", "address": "x@y.z" }));
    }
}
