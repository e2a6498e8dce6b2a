//! Wallet binder - late injection of wallet capabilities
//!
//! Services are constructed before any wallet exists. Once the wallet
//! service is ready (or reconnects) the binder hands each registered
//! service the capability shape it declares.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::protocol::{AcceptsWallet, ServiceHandle, ServiceRegistry};
use crate::vault::types::Protocol;

use super::comet::CometWallet;
use super::WalletCapability;

/// Source of per-chain wallet handles
pub trait WalletProvider: Send + Sync {
    fn wallet(&self, chain_id: u64) -> Option<Arc<dyn WalletCapability>>;
}

/// Provider over a fixed set of handles, keyed by chain id
#[derive(Default)]
pub struct StaticWalletProvider {
    wallets: DashMap<u64, Arc<dyn WalletCapability>>,
}

impl StaticWalletProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, wallet: Arc<dyn WalletCapability>) {
        self.wallets.insert(wallet.chain_id(), wallet);
    }
}

impl WalletProvider for StaticWalletProvider {
    fn wallet(&self, chain_id: u64) -> Option<Arc<dyn WalletCapability>> {
        self.wallets.get(&chain_id).map(|w| Arc::clone(w.value()))
    }
}

/// Outcome of one binding pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindReport {
    pub bound: Vec<Protocol>,
    /// Protocols whose chain had no wallet available
    pub missing: Vec<(Protocol, u64)>,
}

/// Owns injected capabilities and wires them into services
///
/// Services keep weak references, so the binder must live as long as the
/// wallets should stay usable.
#[derive(Default)]
pub struct WalletBinder {
    /// Generic handles, one per injected service
    wallets: DashMap<(Protocol, u64), Arc<dyn WalletCapability>>,

    /// Compound adapters, one per injected service
    comet_adapters: DashMap<(Protocol, u64), Arc<CometWallet>>,
}

impl WalletBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject wallets from `provider` into every registered service
    ///
    /// Calling this again (after a reconnect) replaces the previous wallets
    /// without rebuilding any service.
    pub async fn bind(&self, registry: &ServiceRegistry, provider: &dyn WalletProvider) -> BindReport {
        let mut report = BindReport::default();

        for handle in registry.services() {
            let protocol = handle.protocol();
            let chain_id = handle.config().chain_id;

            match provider.wallet(chain_id) {
                Some(wallet) => {
                    self.inject(&handle, wallet).await;
                    report.bound.push(protocol);
                }
                None => {
                    warn!(protocol = %protocol, chain_id, "No wallet available for chain");
                    report.missing.push((protocol, chain_id));
                }
            }
        }

        info!(
            bound = report.bound.len(),
            missing = report.missing.len(),
            "Wallet binding complete"
        );

        report
    }

    /// Inject one wallet into one service, adapting it to the shape the
    /// service declares
    pub async fn inject(&self, handle: &ServiceHandle, wallet: Arc<dyn WalletCapability>) {
        let key = (handle.protocol(), wallet.chain_id());
        self.wallets.insert(key, Arc::clone(&wallet));

        match handle {
            ServiceHandle::Aave(service) => service.set_wallet(&wallet).await,
            ServiceHandle::Morpho(service) => service.set_wallet(&wallet).await,
            ServiceHandle::Pendle(service) => service.set_wallet(&wallet).await,
            ServiceHandle::Compound(service) => {
                let adapter = Arc::new(CometWallet::new(wallet));
                self.comet_adapters.insert(key, Arc::clone(&adapter));
                service.set_wallet(&adapter).await;
            }
        }
    }
}
