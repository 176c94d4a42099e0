//! Nonce management for reliable transaction submission
//!
//! Handles:
//! - Local tracking of the next nonce per sender
//! - Fallback to the network's pending nonce on a cold cache
//! - Recognising send failures caused by a stale nonce

use crate::config::DispatcherConfig;
use crate::error::BoxError;

use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;
use std::error::Error;

/// Source of truth for the next usable nonce of an account
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NonceSource: Send + Sync {
    /// Next nonce for `account` on `chain_id`, counting pending transactions
    async fn pending_nonce_at(&self, chain_id: u64, account: Address) -> Result<u64, BoxError>;
}

/// Next nonce to hand out per sender.
///
/// Advisory only: entries are created on the first successful send and
/// resynchronised from the [`NonceSource`] whenever they go missing or stale.
/// Not synchronised itself; the dispatcher owns it behind a single lock.
#[derive(Debug, Default)]
pub struct NonceCache {
    next: HashMap<Address, u64>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached next nonce for a sender, if one is known
    pub fn get(&self, account: &Address) -> Option<u64> {
        self.next.get(account).copied()
    }

    /// Record that `used` went out successfully for `account`.
    ///
    /// Saturates at `u64::MAX`; EIP-2681 makes that nonce unusable anyway,
    /// so the network rejects the next send instead of the cache wrapping to 0.
    pub fn advance(&mut self, account: Address, used: u64) {
        self.next.insert(account, used.saturating_add(1));
    }

    pub fn len(&self) -> usize {
        self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }
}

/// Decides whether a send failure was caused by a nonce conflict
#[derive(Debug, Clone)]
pub struct NonceErrorClassifier {
    markers: Vec<String>,
}

impl NonceErrorClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Returns true if any error in the source chain carries a nonce marker
    pub fn is_nonce_error(&self, err: &(dyn Error + 'static)) -> bool {
        let mut current = Some(err);
        while let Some(e) = current {
            if self.matches(&e.to_string()) {
                return true;
            }
            current = e.source();
        }
        false
    }

    fn matches(&self, message: &str) -> bool {
        let message = message.to_ascii_lowercase();
        self.markers.iter().any(|m| message.contains(m.as_str()))
    }
}

impl From<&DispatcherConfig> for NonceErrorClassifier {
    fn from(config: &DispatcherConfig) -> Self {
        Self::new(&config.nonce_error_markers)
    }
}

impl Default for NonceErrorClassifier {
    fn default() -> Self {
        Self::from(&DispatcherConfig::default())
    }
}
