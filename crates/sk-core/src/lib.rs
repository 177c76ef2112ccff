//! Core types for Skirmish: combatants, items, tokens, and references.
//!
//! This crate defines the data model every other crate resolves actions
//! against, plus the collaborator traits ([`EntityProvider`],
//! [`TargetProvider`]) that stand in for the host's persistence and scene
//! layers. [`Encounter`] is an in-memory implementation of both, loadable
//! from JSON.

/// Automation toggles read during hydration and by flow steps.
pub mod config;
/// In-memory encounter implementing the provider traits.
pub mod encounter;
/// Combatant types, identifiers, stats, and conditions.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Items owned by combatants: weapons, systems, tags, and damage.
pub mod item;
/// Collaborator traits and partial-update patches.
pub mod provider;
/// String references to combatants, items, and tokens.
pub mod reference;
/// Tokens on a scene, cover, and live target handles.
pub mod token;
/// Clamped numeric resource tracks.
pub mod track;

/// Re-export configuration.
pub use config::AutomationConfig;
/// Re-export the in-memory encounter.
pub use encounter::{Encounter, EncounterFile, TokenSpec};
/// Re-export core entity types.
pub use entity::{Condition, Defenses, Disposition, Entity, EntityId, EntityKind, Stat, Stats};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export item types.
pub use item::{Damage, DamageType, Item, ItemId, ItemKind, Tag, WeaponProfile, WeaponSize, WeaponType};
/// Re-export provider traits and patches.
pub use provider::{EntityPatch, EntityProvider, ItemPatch, TargetProvider};
/// Re-export reference types.
pub use reference::{DocRef, Resolved};
/// Re-export token types.
pub use token::{Cover, SceneId, TargetHandle, Token, TokenId};
/// Re-export the track type.
pub use track::Track;
