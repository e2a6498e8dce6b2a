//! Replaceable, non-owning wallet slot held by each protocol service

use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::vault::types::Protocol;

/// Single-writer, multi-reader slot for an injected wallet capability
///
/// Readers clone the weak handle under the read lock and upgrade it after
/// releasing the lock, so an in-flight operation keeps using the wallet it
/// started with while a concurrent `set` swaps in the next one.
pub struct WalletSlot<W: ?Sized> {
    protocol: Protocol,
    current: RwLock<Option<Weak<W>>>,
}

impl<W: ?Sized> WalletSlot<W> {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            current: RwLock::new(None),
        }
    }

    /// Inject or replace the wallet
    pub async fn set(&self, wallet: &Arc<W>) {
        *self.current.write().await = Some(Arc::downgrade(wallet));
    }

    /// Remove the wallet (e.g. on disconnect)
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    /// Current wallet, or `WalletNotReady` if none is injected or it was dropped
    pub async fn get(&self) -> Result<Arc<W>> {
        let weak = self.current.read().await.clone();
        weak.and_then(|w| w.upgrade())
            .ok_or(Error::WalletNotReady(self.protocol))
    }

    pub async fn is_ready(&self) -> bool {
        self.get().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_slot_not_ready() {
        let slot: WalletSlot<String> = WalletSlot::new(Protocol::Aave);
        assert!(matches!(slot.get().await, Err(Error::WalletNotReady(Protocol::Aave))));
    }

    #[tokio::test]
    async fn test_replace_and_drop() {
        let slot: WalletSlot<String> = WalletSlot::new(Protocol::Morpho);
        let first = Arc::new("first".to_string());
        let second = Arc::new("second".to_string());

        slot.set(&first).await;
        assert_eq!(*slot.get().await.unwrap(), "first");

        slot.set(&second).await;
        assert_eq!(*slot.get().await.unwrap(), "second");

        // Slot does not keep the wallet alive
        drop(second);
        assert!(!slot.is_ready().await);

        slot.set(&first).await;
        slot.clear().await;
        assert!(!slot.is_ready().await);
    }
}
