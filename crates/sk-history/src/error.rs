use sk_core::EntityId;

/// Alias for `Result<T, HistoryError>`.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors raised by history transitions.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A turn was started before any round.
    #[error("no round has been started")]
    NoActiveRound,

    /// An action was recorded for a combatant without a turn in the current round.
    #[error("entity {0} has no turn in the current round")]
    NoActiveTurn(EntityId),
}
