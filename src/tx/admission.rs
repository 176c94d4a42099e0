//! Interface to the gas price escalator that admits and tracks transactions

use super::gas::EscalationOptions;
use crate::error::BoxError;

use async_trait::async_trait;
use ethers::types::{Address, Transaction};

/// Policy oracle and registration sink backed by the gas price escalator.
///
/// The dispatcher asks it whether a sender may submit, and hands it every
/// transaction that went out so its gas price can be bumped until mined.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    /// Whether another transaction for `sender` fits in the escalation queue
    async fn can_queue(&self, sender: Address) -> Result<bool, BoxError>;

    /// Whether the escalator holds a signer able to re-sign for `sender`
    async fn can_sign(&self, sender: Address) -> bool;

    /// Start escalating a freshly submitted transaction
    async fn insert_initial(
        &self,
        tx: &Transaction,
        opts: &EscalationOptions,
        sender: Address,
    ) -> Result<(), BoxError>;
}
