//! Transaction dispatch module with nonce tracking and escalation admission

mod admission;
mod dispatcher;
mod gas;
mod nonce;

pub use admission::AdmissionGate;
pub use dispatcher::{Dispatcher, ErrorSink, SubmissionOptions};
pub use gas::EscalationOptions;
pub use nonce::{NonceCache, NonceErrorClassifier, NonceSource};
