//! Error types for Wavefall.
//!
//! Every failure the simulation core can report is recoverable. Callers pick
//! the recovery: substitute a fallback, ignore the input, surface a message,
//! or start fresh.

use thiserror::Error;

/// Top-level error taxonomy for core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A catalog table or a referenced id is absent.
    #[error("Content data missing: {0}")]
    ContentDataMissing(String),

    /// Action attempted out of turn, on cooldown, or against an absent target.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Not enough mana, gold, coins or ingredients.
    #[error("Insufficient resource: {0}")]
    InsufficientResource(String),

    /// A persisted snapshot could not be read or repaired.
    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),
}

impl CoreError {
    /// Short machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ContentDataMissing(_) => "content_data_missing",
            Self::InvalidAction(_) => "invalid_action",
            Self::InsufficientResource(_) => "insufficient_resource",
            Self::CorruptPersistedState(_) => "corrupt_persisted_state",
        }
    }

    /// Whether the failure should be shown to the player.
    ///
    /// Invalid actions are silently ignored; everything else is surfaced.
    #[must_use]
    pub const fn is_player_facing(&self) -> bool {
        !matches!(self, Self::InvalidAction(_))
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
