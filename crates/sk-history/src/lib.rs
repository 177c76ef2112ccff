//! Action history for Skirmish encounters.
//!
//! The log is an append-only record of rounds, turns within a round, and the
//! actions each combatant resolved during its turn. Plugins consult it while
//! hydrating ("did I already make a melee attack this turn?"), and flows
//! append to it once an action resolves.

/// History error types.
pub mod error;
/// Rounds, turns, and the log itself.
pub mod log;
/// Immutable action records.
pub mod record;

pub use error::{HistoryError, HistoryResult};
pub use log::{ActionHistory, Round, SharedHistory, Turn};
pub use record::{ActionKind, ActionRecord, HitRecord};
