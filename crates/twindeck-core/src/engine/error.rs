//! Deck control error types

use thiserror::Error;

use super::lock::LockKind;

/// Errors returned synchronously by the deck control facade
///
/// The render thread never produces these: its faults degrade to silence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeckError {
    /// A control-thread spin on a lock word ran out of attempts
    #[error("{lock} lock is busy (gave up after {attempts} attempts)")]
    Busy { lock: LockKind, attempts: u32 },

    /// A register value was rejected before any locked write
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The render kernel could not be built during boot
    #[error("Render kernel unavailable: {0}")]
    KernelUnavailable(String),

    /// The auxiliary command ring is full
    #[error("Auxiliary command queue is full")]
    QueueFull,
}

/// Result type for deck operations
pub type DeckResult<T> = Result<T, DeckError>;

impl DeckError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DeckError::InvalidArgument(message.into())
    }
}
