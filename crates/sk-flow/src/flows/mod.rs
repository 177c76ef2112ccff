//! The built-in flow kinds.

/// System activations.
pub mod activation;
/// Weapon, basic, and tech attacks.
pub mod attack;
/// Damage rolls.
pub mod damage;
/// Overheating.
pub mod overheat;
/// Stat checks.
pub mod stat;
/// Structure damage and system trauma.
pub mod structure;

pub use activation::{ActivationFlow, ActivationPayload};
pub use attack::{
    AttackMode, AttackPayload, AttackResult, BasicAttackFlow, TechAttackFlow, WeaponAttackFlow,
};
pub use damage::{DamageFlow, DamagePart, DamagePayload, DamageResult};
pub use overheat::{OverheatFlow, OverheatOutcome, OverheatPayload};
pub use stat::{StatPayload, StatRollFlow};
pub use structure::{
    StructureFlow, StructureOutcome, StructurePayload, SystemTraumaFlow, TraumaPayload,
    TraumaTarget,
};
