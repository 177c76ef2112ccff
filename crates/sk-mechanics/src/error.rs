//! Error types for roll contexts, dice, and plugins.

use sk_core::CoreError;

/// Errors that can occur while building, hydrating, or rolling a context.
#[derive(Debug, thiserror::Error)]
pub enum RollError {
    /// A dice formula could not be parsed.
    #[error("invalid formula '{formula}': {reason}")]
    InvalidFormula {
        /// The offending formula.
        formula: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Derived roll state was read before the context was hydrated.
    #[error("{0} read before hydration")]
    NotHydrated(String),

    /// A persisted context did not match its schema.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A plugin slug is not known to the registry.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    /// A reference could not be resolved.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience result type for roll operations.
pub type RollResult<T> = Result<T, RollError>;
