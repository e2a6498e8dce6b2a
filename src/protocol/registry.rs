//! Protocol service registry - protocol tag to live service instance
//!
//! Services are registered once at startup and live for the process.
//! Lookups hand out clones of the same `Arc`, so wallet state injected
//! through one handle is visible through every other.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::chain::ChainReader;
use crate::error::{Error, Result};
use crate::vault::registry::VaultRegistry;
use crate::vault::types::{Protocol, VaultServiceConfig};

use super::{
    AaveService, AcceptsWallet, CompoundService, MorphoService, PendleService, ProtocolService,
};

lazy_static::lazy_static! {
    /// Process-wide registry behind [`ServiceRegistry::global`]
    static ref GLOBAL_REGISTRY: Arc<ServiceRegistry> = Arc::new(ServiceRegistry::new());
}

/// Typed handle to a registered service
///
/// The closed set of variants lets wallet injection pick the right wallet
/// shape at compile time.
#[derive(Clone)]
pub enum ServiceHandle {
    Aave(Arc<AaveService>),
    Compound(Arc<CompoundService>),
    Morpho(Arc<MorphoService>),
    Pendle(Arc<PendleService>),
}

impl ServiceHandle {
    /// Build the service for `config.protocol`
    pub fn build(
        config: VaultServiceConfig,
        markets: Vec<Arc<crate::vault::types::VaultMarketInfo>>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        match config.protocol {
            Protocol::Aave => AaveService::new(config, markets, chain).into(),
            Protocol::Compound => CompoundService::new(config, markets, chain).into(),
            Protocol::Morpho => MorphoService::new(config, markets, chain).into(),
            Protocol::Pendle => PendleService::new(config, markets, chain).into(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            ServiceHandle::Aave(_) => Protocol::Aave,
            ServiceHandle::Compound(_) => Protocol::Compound,
            ServiceHandle::Morpho(_) => Protocol::Morpho,
            ServiceHandle::Pendle(_) => Protocol::Pendle,
        }
    }

    /// The uniform operation surface
    pub fn service(&self) -> Arc<dyn ProtocolService> {
        match self {
            ServiceHandle::Aave(s) => Arc::clone(s) as Arc<dyn ProtocolService>,
            ServiceHandle::Compound(s) => Arc::clone(s) as Arc<dyn ProtocolService>,
            ServiceHandle::Morpho(s) => Arc::clone(s) as Arc<dyn ProtocolService>,
            ServiceHandle::Pendle(s) => Arc::clone(s) as Arc<dyn ProtocolService>,
        }
    }

    pub fn config(&self) -> &VaultServiceConfig {
        match self {
            ServiceHandle::Aave(s) => s.config(),
            ServiceHandle::Compound(s) => s.config(),
            ServiceHandle::Morpho(s) => s.config(),
            ServiceHandle::Pendle(s) => s.config(),
        }
    }

    pub async fn wallet_ready(&self) -> bool {
        match self {
            ServiceHandle::Aave(s) => s.wallet_ready().await,
            ServiceHandle::Compound(s) => s.wallet_ready().await,
            ServiceHandle::Morpho(s) => s.wallet_ready().await,
            ServiceHandle::Pendle(s) => s.wallet_ready().await,
        }
    }

    /// Reference equality of the underlying service
    pub fn same_instance(&self, other: &ServiceHandle) -> bool {
        match (self, other) {
            (ServiceHandle::Aave(a), ServiceHandle::Aave(b)) => Arc::ptr_eq(a, b),
            (ServiceHandle::Compound(a), ServiceHandle::Compound(b)) => Arc::ptr_eq(a, b),
            (ServiceHandle::Morpho(a), ServiceHandle::Morpho(b)) => Arc::ptr_eq(a, b),
            (ServiceHandle::Pendle(a), ServiceHandle::Pendle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<AaveService> for ServiceHandle {
    fn from(service: AaveService) -> Self {
        ServiceHandle::Aave(Arc::new(service))
    }
}

impl From<CompoundService> for ServiceHandle {
    fn from(service: CompoundService) -> Self {
        ServiceHandle::Compound(Arc::new(service))
    }
}

impl From<MorphoService> for ServiceHandle {
    fn from(service: MorphoService) -> Self {
        ServiceHandle::Morpho(Arc::new(service))
    }
}

impl From<PendleService> for ServiceHandle {
    fn from(service: PendleService) -> Self {
        ServiceHandle::Pendle(Arc::new(service))
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServiceHandle({})", self.protocol())
    }
}

/// Mapping from protocol tag to its one live service
#[derive(Default)]
pub struct ServiceRegistry {
    services: DashMap<Protocol, ServiceHandle>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<ServiceRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Build a registry with one service per protocol configured for `network`
    pub fn from_vaults(vaults: &VaultRegistry, network: &str, chain: Arc<dyn ChainReader>) -> Result<Self> {
        let registry = Self::new();
        registry.register_from(vaults, network, chain)?;
        Ok(registry)
    }

    /// Register one service per protocol configured for `network`
    pub fn register_from(&self, vaults: &VaultRegistry, network: &str, chain: Arc<dyn ChainReader>) -> Result<()> {
        let configs = vaults.service_configs_for(network);
        if configs.is_empty() {
            return Err(Error::Config(format!(
                "No protocol services configured for network {}",
                network
            )));
        }

        for config in configs {
            let protocol = config.protocol;
            let markets = vaults.markets_for(protocol, config.chain_id);
            let handle = ServiceHandle::build(config.clone(), markets, Arc::clone(&chain));
            self.register_service(protocol, handle)?;
        }

        info!(network, services = self.len(), "Protocol services registered");
        Ok(())
    }

    /// Register `service` under `protocol`; a second registration for the
    /// same protocol is rejected so injected wallet state is never lost
    pub fn register_service(&self, protocol: Protocol, service: impl Into<ServiceHandle>) -> Result<()> {
        let handle = service.into();

        if handle.protocol() != protocol {
            return Err(Error::Config(format!(
                "Cannot register a {} service under {}",
                handle.protocol(),
                protocol
            )));
        }

        match self.services.entry(protocol) {
            Entry::Occupied(_) => Err(Error::DuplicateService(protocol)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                debug!(protocol = %protocol, "Protocol service registered");
                Ok(())
            }
        }
    }

    /// The registered instance for `protocol`, if any
    pub fn get_service(&self, protocol: Protocol) -> Option<ServiceHandle> {
        self.services.get(&protocol).map(|entry| entry.value().clone())
    }

    /// All registered services, ordered by protocol tag
    pub fn services(&self) -> Vec<ServiceHandle> {
        let mut handles: Vec<_> = self.services.iter().map(|e| e.value().clone()).collect();
        handles.sort_by_key(|h| h.protocol());
        handles
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        self.services().iter().map(ServiceHandle::protocol).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedChain;
    use crate::protocol::test_support::{market, registry_with_all, user, CHAIN_ID, NETWORK};
    use crate::vault::types::VaultOperationParams;
    use crate::wallet::WalletCapability;

    fn aave(chain: &Arc<SimulatedChain>) -> AaveService {
        AaveService::new(
            VaultServiceConfig::new(Protocol::Aave, NETWORK, CHAIN_ID),
            vec![Arc::new(market(Protocol::Aave))],
            chain.clone(),
        )
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let chain = SimulatedChain::new();
        let registry = ServiceRegistry::new();

        registry.register_service(Protocol::Aave, aave(&chain)).unwrap();
        let err = registry.register_service(Protocol::Aave, aave(&chain)).unwrap_err();

        assert!(matches!(err, Error::DuplicateService(Protocol::Aave)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mismatched_tag_rejected() {
        let chain = SimulatedChain::new();
        let registry = ServiceRegistry::new();

        let err = registry.register_service(Protocol::Morpho, aave(&chain)).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(registry.get_service(Protocol::Morpho).is_none());
    }

    #[test]
    fn test_unsupported_protocol_is_none() {
        let registry = ServiceRegistry::new();
        assert!(registry.get_service(Protocol::Pendle).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_is_identity_stable() {
        let chain = SimulatedChain::new();
        let registry = registry_with_all(&chain);

        let first = registry.get_service(Protocol::Aave).unwrap();
        let second = registry.get_service(Protocol::Aave).unwrap();
        assert!(first.same_instance(&second));

        // Inject through one handle, observe through the other
        let wallet: Arc<dyn WalletCapability> = chain.wallet(&user(), CHAIN_ID);
        if let ServiceHandle::Aave(service) = &first {
            service.set_wallet(&wallet).await;
        }
        assert!(second.wallet_ready().await);

        let params = VaultOperationParams::new(Arc::new(market(Protocol::Aave)), "1");
        assert!(second.service().deposit(params).await.is_success());
    }

    #[test]
    fn test_services_sorted_by_tag() {
        let chain = SimulatedChain::new();
        let registry = registry_with_all(&chain);

        assert_eq!(
            registry.protocols(),
            vec![Protocol::Aave, Protocol::Compound, Protocol::Morpho, Protocol::Pendle]
        );
    }

    #[test]
    fn test_register_from_unknown_network() {
        let chain = SimulatedChain::new();
        let vaults = crate::protocol::test_support::vault_registry();

        let result = ServiceRegistry::from_vaults(&vaults, "arbitrum", chain);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&ServiceRegistry::global(), &ServiceRegistry::global()));
    }
}
