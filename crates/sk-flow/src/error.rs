use sk_core::CoreError;
use sk_mechanics::RollError;

/// Alias for `Result<T, FlowError>`.
pub type FlowResult<T> = Result<T, FlowError>;

/// Fatal errors that stop a flow.
///
/// Precondition failures and user cancellation are not errors: the step
/// returns `Ok(false)` instead.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Reference resolution or persistence failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Roll context or dice failure.
    #[error(transparent)]
    Roll(#[from] RollError),

    /// No flow kind is registered under the name.
    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    /// A step key used as an anchor or removal target is absent.
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// A step key is already present in the sequence.
    #[error("duplicate step: {0}")]
    DuplicateStep(String),

    /// The payload could not be encoded or decoded.
    #[error("invalid payload for {flow}: {reason}")]
    Payload {
        /// The flow kind.
        flow: String,
        /// What went wrong.
        reason: String,
    },
}
