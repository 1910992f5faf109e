//! Typed errors for registration and dispatch.

use thiserror::Error;

use crate::key::ReceiverId;
use crate::receiver::Params;

/// Errors raised by signal operations.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Receiver cannot accept the leading `(signal, sender)` arguments
    #[error("invalid receiver {receiver}: takes {params}, needs at least (signal, sender)")]
    InvalidReceiver { receiver: ReceiverId, params: Params },

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure of a single receiver invocation.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The receiver body returned an error
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// The receiver body panicked
    #[error("receiver panicked: {0}")]
    Panicked(String),
}

/// Error surfaced by a fail-fast dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{receiver} failed")]
    Receiver {
        receiver: ReceiverId,
        #[source]
        source: ReceiverError,
    },
}

impl DispatchError {
    /// The receiver whose failure aborted the dispatch.
    pub fn receiver(&self) -> ReceiverId {
        match self {
            DispatchError::Receiver { receiver, .. } => *receiver,
        }
    }

    pub fn into_source(self) -> ReceiverError {
        match self {
            DispatchError::Receiver { source, .. } => source,
        }
    }
}

/// Marker a receiver returns when the target it forwards to is gone.
///
/// Dispatch treats it as a stale reference: the receiver is purged from the
/// registry and left out of the results, under both dispatch policies.
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("receiver reference is no longer valid")]
pub struct StaleReference;

/// Result type alias for signal operations.
pub type SignalResult<T> = std::result::Result<T, SignalError>;
