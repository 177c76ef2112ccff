//! Roll resolution mechanics for Skirmish.
//!
//! Provides the dice formula language and a seeded evaluator, the roll
//! context model (weapon, base, and per-target containers with their
//! accuracy totals), and the plugin registry whose situational modifiers
//! are hydrated against live state before every roll.

pub mod context;
pub mod dice;
pub mod error;
pub mod plugin;
pub mod plugins;

pub use context::{
    AttackParams, AttackRollContext, BaseContext, DamageFormula, DamageParams, DamageRollContext,
    RollTotal, TargetContext, WeaponContext,
};
pub use dice::{DiceEvaluator, Die, DieResult, Formula, Roll, RollEvaluator, accuracy_formula};
pub use error::{RollError, RollResult};
pub use plugin::{
    Activation, Family, HydrateCtx, PluginBuilder, PluginDef, PluginInstance, PluginMap,
    PluginRegistry, RollEffect, RollSession, Scope, UiBehavior,
};
