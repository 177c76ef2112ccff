//! Roll contexts: the containers modifiers live in, and their totals.
//!
//! An attack context has three kinds of container:
//! - [`WeaponContext`]: target-independent traits (accurate, seeking, ...)
//!   and per-roll plugins.
//! - [`BaseContext`]: the flat bonus, user accuracy/difficulty, chosen cover,
//!   and per-unknown-target plugins.
//! - [`TargetContext`]: one per targeted token, with that target's cover,
//!   Lock On, and per-target plugins.
//!
//! Contexts are built in two phases. Decoding (`from_object`) validates the
//! persisted shape and resolves tokens back to live targets; `hydrate` then
//! derives everything that depends on live state. Totals are unavailable
//! until hydration has run.

mod attack;
mod base;
mod damage;
mod target;
mod weapon;

pub use attack::{AttackParams, AttackRollContext};
pub use base::BaseContext;
pub use damage::{
    DamageBaseContext, DamageFormula, DamageParams, DamageRollContext, DamageTargetContext,
    DamageWeaponContext,
};
pub use target::TargetContext;
pub use weapon::WeaponContext;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sk_core::{CoreError, Cover, DocRef, TargetHandle, TargetProvider, TokenId};

use crate::error::{RollError, RollResult};

/// One computed accuracy total and the formula that rolls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollTotal {
    /// The target this total is against; `None` for an untargeted roll.
    pub token: Option<TokenId>,
    /// Net accuracy (positive) or difficulty (negative).
    pub total: i32,
    /// The final formula after plugin rewrites.
    pub formula: String,
}

/// The cover a freshly targeted token starts with.
pub(crate) fn seed_cover(handle: &TargetHandle, fallback: Cover) -> Cover {
    if handle.cover == Cover::None {
        fallback
    } else {
        handle.cover
    }
}

pub(crate) fn resolve_target(
    targets: &dyn TargetProvider,
    token: TokenId,
) -> RollResult<TargetHandle> {
    targets.target(token).ok_or_else(|| {
        RollError::Core(CoreError::ReferenceNotFound(DocRef::Token(token).to_string()))
    })
}

pub(crate) fn encode<T: Serialize>(value: &T) -> RollResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| RollError::Validation(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(value: serde_json::Value) -> RollResult<T> {
    serde_json::from_value(value).map_err(|e| RollError::Validation(e.to_string()))
}
