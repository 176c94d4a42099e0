//! Chain module - JSON-RPC access used to resynchronise nonces
//!
//! This module provides:
//! - Multi-RPC provider management with automatic failover
//! - A [`NonceSource`] over every configured chain

pub mod provider;

pub use provider::ChainProvider;

use crate::config::Settings;
use crate::error::{BoxError, DispatchError, DispatchResult};
use crate::tx::NonceSource;

use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Providers for all enabled chains, indexed by chain ID.
///
/// A [`Dispatcher`](crate::tx::Dispatcher) caches nonces by sender only, so
/// give each chain its own dispatcher even when they share this registry.
#[derive(Default)]
pub struct ChainRegistry {
    providers: HashMap<u64, Arc<ChainProvider>>,
}

impl ChainRegistry {
    /// Create providers for every enabled chain
    pub fn new(settings: &Settings) -> DispatchResult<Self> {
        let mut registry = Self::default();

        for (name, chain_config) in settings.enabled_chains() {
            info!("Initializing chain {} (ID: {})", name, chain_config.chain_id);
            let provider = ChainProvider::new(chain_config.clone())?;
            registry.insert(Arc::new(provider));
        }

        Ok(registry)
    }

    pub fn insert(&mut self, provider: Arc<ChainProvider>) {
        self.providers.insert(provider.chain_id(), provider);
    }

    /// Get provider for a specific chain
    pub fn get_provider(&self, chain_id: u64) -> DispatchResult<Arc<ChainProvider>> {
        self.providers
            .get(&chain_id)
            .cloned()
            .ok_or(DispatchError::ChainNotFound { chain_id })
    }

    /// Get all connected chain IDs
    pub fn connected_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.providers.keys().copied().collect();
        chains.sort_unstable();
        chains
    }
}

#[async_trait]
impl NonceSource for ChainRegistry {
    async fn pending_nonce_at(&self, chain_id: u64, account: Address) -> Result<u64, BoxError> {
        let provider = self.get_provider(chain_id)?;
        Ok(provider.pending_nonce(account).await?)
    }
}
