//! Nonce-tracking dispatcher gated by the gas price escalator
//!
//! A dispatch goes through four steps:
//! 1. Validate the submission options
//! 2. Ask the admission gate whether the sender may queue and be signed for
//! 3. Pick a nonce (cache or network), send, and resend once on a nonce conflict
//! 4. Hand the sent transaction to the escalator, best-effort

use super::admission::AdmissionGate;
use super::gas::EscalationOptions;
use super::nonce::{NonceCache, NonceErrorClassifier, NonceSource};
use crate::config::DispatcherConfig;
use crate::error::{BoxError, DispatchError, DispatchResult};
use crate::events::{DispatchEvent, DispatchEventKind, EventBus};
use crate::metrics;
use crate::util;

use ethers::types::{Address, Transaction};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Receives failures that do not fail the dispatch itself
pub type ErrorSink = Arc<dyn Fn(&DispatchError) + Send + Sync>;

/// Options given with every dispatch
#[derive(Debug, Clone)]
pub struct SubmissionOptions {
    /// Account that signs and pays for the transaction
    pub sender: Address,
    /// Passed through to the escalator once the transaction is out
    pub escalation: EscalationOptions,
    /// Skip the admission check. Nonce tracking still applies.
    pub force_queue: bool,
}

impl SubmissionOptions {
    pub fn new(sender: Address, escalation: EscalationOptions) -> Self {
        Self {
            sender,
            escalation,
            force_queue: false,
        }
    }

    /// Build options from a hex-encoded sender address
    pub fn from_hex_sender(sender: &str, escalation: EscalationOptions) -> DispatchResult<Self> {
        Ok(Self::new(util::parse_address(sender)?, escalation))
    }

    pub fn with_force_queue(mut self, force_queue: bool) -> Self {
        self.force_queue = force_queue;
        self
    }

    /// Validate the options before anything touches the network
    pub fn validate(&self) -> DispatchResult<()> {
        if self.sender.is_zero() {
            return Err(DispatchError::InvalidOptions(
                "sender address must be specified".to_string(),
            ));
        }
        self.escalation.validate()
    }
}

/// Sends transactions with a correct nonce and registers them for gas price escalation.
///
/// All dispatches share one lock over the nonce cache, so sends serialize
/// across every sender, not just per account.
pub struct Dispatcher {
    /// Gas price escalator acting as admission gate
    gate: Arc<dyn AdmissionGate>,
    /// Network view of pending nonces
    nonce_source: Arc<dyn NonceSource>,
    /// Next nonce per sender
    nonces: Mutex<NonceCache>,
    classifier: NonceErrorClassifier,
    events: EventBus,
    error_sink: Option<ErrorSink>,
}

impl Dispatcher {
    /// Create a dispatcher with default settings
    pub fn new(gate: Arc<dyn AdmissionGate>, nonce_source: Arc<dyn NonceSource>) -> Self {
        Self::with_config(gate, nonce_source, &DispatcherConfig::default())
    }

    pub fn with_config(
        gate: Arc<dyn AdmissionGate>,
        nonce_source: Arc<dyn NonceSource>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            gate,
            nonce_source,
            nonces: Mutex::new(NonceCache::new()),
            classifier: NonceErrorClassifier::from(config),
            events: EventBus::new(config.event_channel_capacity.max(1)),
            error_sink: None,
        }
    }

    /// Attach a sink for non-fatal errors, such as the escalator refusing a sent transaction.
    ///
    /// Must happen before the dispatcher is shared.
    pub fn attach_error_sink<F>(&mut self, sink: F)
    where
        F: Fn(&DispatchError) + Send + Sync + 'static,
    {
        self.error_sink = Some(Arc::new(sink));
    }

    /// Subscribe to dispatch events
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Send a transaction built by `send` for the nonce it is given.
    ///
    /// `send` is called once, or twice if the first attempt fails with a
    /// nonce conflict. On success the transaction is registered with the
    /// escalator; a failure there is only reported to the error sink.
    pub async fn dispatch<F, Fut>(
        &self,
        chain_id: u64,
        opts: &SubmissionOptions,
        send: F,
    ) -> DispatchResult<Transaction>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<Transaction, BoxError>>,
    {
        opts.validate()?;

        self.admit(chain_id, opts).await?;

        let (tx, nonce) = match self
            .send_with_nonce_tracking(chain_id, opts.sender, send)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                metrics::record_dispatch_failed(chain_id, e.kind());
                return Err(e);
            }
        };

        info!(
            "Transaction {:?} dispatched for {:?} on chain {} with nonce {}",
            tx.hash, opts.sender, chain_id, nonce
        );
        metrics::record_dispatched(chain_id);
        self.events.publish(DispatchEvent::new(
            chain_id,
            opts.sender,
            DispatchEventKind::Dispatched {
                nonce,
                tx_hash: tx.hash,
            },
        ));

        if let Err(e) = self
            .gate
            .insert_initial(&tx, &opts.escalation, opts.sender)
            .await
        {
            let err = DispatchError::Registration(e);
            warn!("Transaction {:?} on chain {}: {}", tx.hash, chain_id, err);
            metrics::record_registration_failed(chain_id);
            self.events.publish(DispatchEvent::new(
                chain_id,
                opts.sender,
                DispatchEventKind::RegistrationFailed {
                    tx_hash: tx.hash,
                    reason: err.to_string(),
                },
            ));
            self.report(&err);
        }

        Ok(tx)
    }

    /// Cached next nonce for a sender
    pub async fn cached_nonce(&self, sender: Address) -> Option<u64> {
        self.nonces.lock().await.get(&sender)
    }

    async fn admit(&self, chain_id: u64, opts: &SubmissionOptions) -> DispatchResult<()> {
        if opts.force_queue {
            debug!("Admission check bypassed for {:?}", opts.sender);
            return Ok(());
        }

        let can_queue = self
            .gate
            .can_queue(opts.sender)
            .await
            .map_err(DispatchError::Admission)?;
        if !can_queue {
            return Err(self.reject(chain_id, opts.sender, DispatchError::QueueFull));
        }

        if !self.gate.can_sign(opts.sender).await {
            return Err(self.reject(chain_id, opts.sender, DispatchError::NoSigners));
        }

        Ok(())
    }

    fn reject(&self, chain_id: u64, sender: Address, err: DispatchError) -> DispatchError {
        debug!("Admission refused for {:?} on chain {}: {}", sender, chain_id, err);
        metrics::record_admission_rejected(chain_id, err.kind());
        self.events.publish(DispatchEvent::new(
            chain_id,
            sender,
            DispatchEventKind::AdmissionRejected {
                reason: err.kind().to_string(),
            },
        ));
        err
    }

    /// Runs under the cache lock from nonce selection to cache update
    async fn send_with_nonce_tracking<F, Fut>(
        &self,
        chain_id: u64,
        account: Address,
        mut send: F,
    ) -> DispatchResult<(Transaction, u64)>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<Transaction, BoxError>>,
    {
        let mut nonces = self.nonces.lock().await;

        let nonce = match nonces.get(&account) {
            Some(nonce) => nonce,
            None => {
                metrics::record_cache_miss(chain_id);
                let nonce = self.fetch_nonce(chain_id, account).await?;
                debug!(
                    "No cached nonce for {:?} on chain {}, network says {}",
                    account, chain_id, nonce
                );
                nonce
            }
        };

        let (tx, used) = match send(nonce).await {
            Ok(tx) => (tx, nonce),
            Err(e) => {
                if !self.classifier.is_nonce_error(&*e) {
                    return Err(DispatchError::Send(e));
                }
                warn!(
                    "Nonce {} for {:?} on chain {} rejected ({}), resyncing",
                    nonce, account, chain_id, e
                );
                let fresh = self.fetch_nonce(chain_id, account).await?;
                let tx = send(fresh)
                    .await
                    .map_err(DispatchError::RecoveredSendFailed)?;

                metrics::record_nonce_recovery(chain_id);
                self.events.publish(DispatchEvent::new(
                    chain_id,
                    account,
                    DispatchEventKind::NonceRecovered {
                        stale: nonce,
                        fresh,
                    },
                ));
                (tx, fresh)
            }
        };

        nonces.advance(account, used);

        Ok((tx, used))
    }

    async fn fetch_nonce(&self, chain_id: u64, account: Address) -> DispatchResult<u64> {
        self.nonce_source
            .pending_nonce_at(chain_id, account)
            .await
            .map_err(|source| DispatchError::NonceQuery { chain_id, source })
    }

    fn report(&self, err: &DispatchError) {
        if let Some(sink) = &self.error_sink {
            sink(err);
        }
    }
}
