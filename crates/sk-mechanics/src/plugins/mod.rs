//! The built-in plugin set.
//!
//! Each plugin here is an ordinary registry entry assembled with
//! [`PluginBuilder`]; callers may register their own alongside or instead of
//! these.

use sk_core::Condition;
use sk_history::ActionKind;

use crate::error::RollResult;
use crate::plugin::{Family, FieldKind, HydrateCtx, PluginBuilder, PluginDef, PluginRegistry, Scope};

/// Slug of the follow-up strike talent.
pub const FOLLOW_UP: &str = "follow_up";
/// Slug of the point-blank bonus.
pub const POINT_BLANK: &str = "point_blank";
/// Slug of the bolstered bonus.
pub const BOLSTERED: &str = "bolstered";
/// Slug of the exposed-target reminder.
pub const EXPOSED: &str = "exposed";
/// Slug of the steady-aim talent.
pub const STEADY_AIM: &str = "steady_aim";
/// Slug of the knockdown damage bonus.
pub const KNOCKDOWN: &str = "knockdown";

fn ranged_weapon(ctx: &HydrateCtx<'_>) -> bool {
    ctx.weapon().is_some_and(|w| !w.weapon_type.is_melee())
}

fn follow_up() -> RollResult<PluginDef> {
    PluginBuilder::new(FOLLOW_UP, "Follow-up Strike")
        .scope(Scope::PerRoll)
        .talent(FOLLOW_UP, 1, |ctx| {
            Ok(ctx
                .current_turn_actions()
                .iter()
                .any(|a| a.is_auxiliary_melee()))
        })
        .accuracy(1)
        .build()
}

fn point_blank() -> RollResult<PluginDef> {
    PluginBuilder::new(POINT_BLANK, "Point Blank")
        .scope(Scope::PerTarget)
        .field("range", FieldKind::Int)
        .always_on(|ctx| {
            if !ranged_weapon(ctx) {
                return Ok(false);
            }
            let range = ctx.field_int("range").unwrap_or(1);
            let distance = ctx
                .distance_to_target()
                .ok_or_else(|| "attacker or target is not on the scene".to_string())?;
            Ok(i64::from(distance) <= range)
        })
        .accuracy(1)
        .build()
}

fn bolstered() -> RollResult<PluginDef> {
    PluginBuilder::new(BOLSTERED, "Bolstered")
        .scope(Scope::PerUnknownTarget)
        .always_on(|ctx| Ok(ctx.actor.has_condition(Condition::Bolstered)))
        .accuracy(1)
        .build()
}

fn exposed() -> RollResult<PluginDef> {
    PluginBuilder::new(EXPOSED, "Exposed")
        .scope(Scope::PerTarget)
        .reminder(|ctx| Ok(ctx.target_has(Condition::Exposed)))
        .build()
}

fn steady_aim() -> RollResult<PluginDef> {
    PluginBuilder::new(STEADY_AIM, "Steady Aim")
        .scope(Scope::PerRoll)
        .talent(STEADY_AIM, 1, |ctx| {
            Ok(!ctx.current_turn_actions().iter().any(|a| {
                matches!(a.kind, ActionKind::Attack | ActionKind::TechAttack)
            }))
        })
        .rewrite(10, |f| f.replacen("1d20", "2d20kh1", 1))
        .build()
}

fn knockdown() -> RollResult<PluginDef> {
    PluginBuilder::new(KNOCKDOWN, "Knockdown")
        .family(Family::Damage)
        .scope(Scope::PerTarget)
        .always_on(|ctx| Ok(ctx.target_has(Condition::Prone)))
        .rewrite(0, |f| format!("{f} + 1d6"))
        .build()
}

/// Register the built-in plugins, in a fixed order.
pub fn register_defaults(registry: &mut PluginRegistry) -> RollResult<()> {
    for def in [
        follow_up()?,
        point_blank()?,
        bolstered()?,
        exposed()?,
        steady_aim()?,
        knockdown()?,
    ] {
        registry.register(def);
    }
    Ok(())
}

/// A registry holding only the built-in plugins.
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    if let Err(e) = register_defaults(&mut registry) {
        tracing::error!(error = %e, "built-in plugin failed to build");
    }
    registry
}
