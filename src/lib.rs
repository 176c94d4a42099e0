//! Tesseract Dispatcher - nonce-tracking transaction submission
//!
//! Submits signed transactions per sender with a locally tracked nonce,
//! recovers once from stale-nonce rejections, and hands every sent
//! transaction to an external gas price escalator that also decides
//! whether a sender may submit at all.

pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod telemetry;
pub mod tx;
pub mod util;

pub use chain::{ChainProvider, ChainRegistry};
pub use config::Settings;
pub use error::{BoxError, DispatchError, DispatchResult};
pub use events::{DispatchEvent, DispatchEventKind};
pub use tx::{
    AdmissionGate, Dispatcher, EscalationOptions, NonceErrorClassifier, NonceSource,
    SubmissionOptions,
};
