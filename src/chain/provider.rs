//! Chain provider with multi-RPC support and automatic failover

use crate::config::ChainConfig;
use crate::error::{DispatchError, DispatchResult};

use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Chain configuration
    config: ChainConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider. No request is made until first use.
    pub fn new(config: ChainConfig) -> DispatchResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(DispatchError::ChainConnection {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    /// Next nonce for `account`, counting transactions still in the mempool
    pub async fn pending_nonce(&self, account: Address) -> DispatchResult<u64> {
        let mut last_error = None;

        for _ in 0..self.http_providers.len() {
            match self
                .http()
                .get_transaction_count(account, Some(BlockNumber::Pending.into()))
                .await
            {
                Ok(count) => {
                    if count > U256::from(u64::MAX) {
                        return Err(DispatchError::ChainConnection {
                            chain_id: self.config.chain_id,
                            message: format!(
                                "pending nonce {} for {:?} does not fit in u64",
                                count, account
                            ),
                        });
                    }
                    return Ok(count.as_u64());
                }
                Err(e) => {
                    warn!(
                        "Failed to get pending nonce for {:?} from chain {}: {}",
                        account, self.config.chain_id, e
                    );
                    last_error = Some(e.to_string());
                    self.failover();
                }
            }
        }

        Err(DispatchError::ChainConnection {
            chain_id: self.config.chain_id,
            message: format!(
                "All providers failed: {}",
                last_error.unwrap_or_else(|| "no response".to_string())
            ),
        })
    }

    /// Get chain ID
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Get chain name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of configured RPC endpoints
    pub fn provider_count(&self) -> usize {
        self.http_providers.len()
    }
}
