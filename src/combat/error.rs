//! Combat error types

use super::dice::DiceError;
use crate::content::ContentError;

/// Errors surfaced to whoever supplies combat content.
///
/// Stale roll results and illegal player actions are not errors; the engine
/// ignores them.
#[derive(Debug, thiserror::Error)]
pub enum CombatError {
    /// Malformed dice in monster or hero content
    #[error(transparent)]
    Dice(#[from] DiceError),
    /// The monster source could not be read
    #[error("monster lookup failed: {0}")]
    Content(#[from] ContentError),
}
