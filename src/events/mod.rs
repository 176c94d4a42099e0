//! Dispatch events published for observability collaborators
//!
//! Every event carries a unique id and a timestamp so consumers can
//! correlate them with logs.

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something noteworthy that happened while dispatching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub chain_id: u64,
    pub sender: Address,
    pub kind: DispatchEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEventKind {
    /// Transaction went out with the given nonce
    Dispatched { nonce: u64, tx_hash: H256 },

    /// A nonce conflict was resolved by resyncing from the network
    NonceRecovered { stale: u64, fresh: u64 },

    /// Admission was refused before any nonce was consumed
    AdmissionRejected { reason: String },

    /// Transaction was sent but the escalator did not accept it
    RegistrationFailed { tx_hash: H256, reason: String },
}

impl DispatchEvent {
    pub fn new(chain_id: u64, sender: Address, kind: DispatchEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            chain_id,
            sender,
            kind,
        }
    }

    /// Get event name for logging/metrics
    pub fn name(&self) -> &'static str {
        match &self.kind {
            DispatchEventKind::Dispatched { .. } => "Dispatched",
            DispatchEventKind::NonceRecovered { .. } => "NonceRecovered",
            DispatchEventKind::AdmissionRejected { .. } => "AdmissionRejected",
            DispatchEventKind::RegistrationFailed { .. } => "RegistrationFailed",
        }
    }
}

/// Fan-out of dispatch events; publishing never blocks and never fails
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DispatchEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}
