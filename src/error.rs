//! Error types for the transaction dispatcher

use thiserror::Error;

/// Opaque failure reported by a collaborator (admission gate, nonce source or send callback)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid submission options: {0}")]
    InvalidOptions(String),

    #[error("failed to send a transaction, blockchain queue is full")]
    QueueFull,

    #[error("failed to send a transaction, no signers for incrementing")]
    NoSigners,

    /// The admission query itself failed; the gate's error is passed through as is.
    #[error(transparent)]
    Admission(BoxError),

    #[error("could not get nonce for chain {chain_id}: {source}")]
    NonceQuery {
        chain_id: u64,
        #[source]
        source: BoxError,
    },

    #[error("handler failed to send transaction: {0}")]
    Send(#[source] BoxError),

    #[error("handler recovered nonce but still failed to send transaction: {0}")]
    RecoveredSendFailed(#[source] BoxError),

    #[error("failed to insert initial entry for gas price escalator: {0}")]
    Registration(#[source] BoxError),

    #[error("Chain {chain_id} not found")]
    ChainNotFound { chain_id: u64 },

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },
}

impl DispatchError {
    /// Check if the caller may retry the same submission later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::QueueFull | DispatchError::ChainConnection { .. }
        )
    }

    /// Check if the error points at the caller's inputs or setup rather than the network
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidOptions(_)
                | DispatchError::NoSigners
                | DispatchError::ChainNotFound { .. }
        )
    }

    /// Short, stable label used for metrics and events
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::InvalidOptions(_) => "invalid_options",
            DispatchError::QueueFull => "queue_full",
            DispatchError::NoSigners => "no_signers",
            DispatchError::Admission(_) => "admission",
            DispatchError::NonceQuery { .. } => "nonce_query",
            DispatchError::Send(_) => "send",
            DispatchError::RecoveredSendFailed(_) => "recovered_send_failed",
            DispatchError::Registration(_) => "registration",
            DispatchError::ChainNotFound { .. } => "chain_not_found",
            DispatchError::ChainConnection { .. } => "chain_connection",
        }
    }
}

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;
