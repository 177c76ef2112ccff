//! Damage rolls following an attack.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_core::{Damage, DamageType, EntityPatch, Tag, TokenId};
use sk_history::{ActionKind, ActionRecord, HitRecord};
use sk_mechanics::{DamageParams, DamageRollContext, Roll, RollError};

use super::attack::{INIT, ROLL};
use crate::chat::Template;
use crate::error::FlowResult;
use crate::flow::FlowKind;
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{Step, StepRef, StepSequence};
use crate::steps::{RECORD, RENDER, Render, RenderMessage, record_action, update_actor, with_session};

/// Key of the overkill heat step.
pub const OVERKILL_HEAT: &str = "overkill_heat";

/// One rolled damage entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamagePart {
    /// Damage type.
    pub kind: DamageType,
    /// The evaluated roll.
    pub roll: Roll,
}

/// Damage against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageResult {
    /// The target; `None` for untargeted damage.
    pub token: Option<TokenId>,
    /// Whether the attack hit.
    pub hit: bool,
    /// Whether the attack was a critical hit.
    pub crit: bool,
    /// Rolled entries.
    pub parts: Vec<DamagePart>,
    /// Sum of all entries, halved when requested.
    pub total: i32,
}

/// State of a damage flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DamagePayload {
    /// Roll title.
    pub title: String,
    /// Weapon damage; defaults to the weapon profile.
    pub damage: Vec<Damage>,
    /// Extra damage.
    pub bonus_damage: Vec<Damage>,
    /// Weapon tags; default to the item's tags.
    pub tags: Vec<Tag>,
    /// Outcomes of the attack that led here.
    pub hit_results: Vec<HitRecord>,
    /// Halve the final damage, rounding up.
    pub half: bool,
    /// The roll context, once built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<DamageRollContext>,
    /// Per-target damage, once rolled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<DamageResult>,
    /// Heat from overkill dice.
    pub overkill_heat: i32,
}

impl Render for DamagePayload {
    fn template(&self) -> Template {
        Template::Damage
    }
}

/// Builds or re-binds the damage context and hydrates it.
#[derive(Debug, Clone, Copy)]
pub struct InitDamage;

#[async_trait]
impl Step<DamagePayload> for InitDamage {
    async fn run(
        &self,
        state: &mut FlowState<DamagePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let weapon = state.item.as_ref().and_then(|i| i.weapon_profile());
        let payload = &mut state.payload;
        if payload.damage.is_empty() {
            payload.damage = weapon.map(|w| w.damage.clone()).unwrap_or_default();
        }
        if payload.tags.is_empty() {
            payload.tags = state.item.as_ref().map(|i| i.tags.clone()).unwrap_or_default();
        }
        if payload.title.is_empty() {
            payload.title = state
                .item
                .as_ref()
                .map_or_else(|| "Damage".to_string(), |i| format!("{} damage", i.name));
        }

        let mut ctx = match payload.context.take() {
            Some(mut ctx) => {
                ctx.bind(&services.plugins, services.targets.as_ref())?;
                ctx
            }
            None => DamageRollContext::from_params(
                DamageParams {
                    title: payload.title.clone(),
                    weapon: weapon.is_some(),
                    tags: payload.tags.clone(),
                    damage: payload.damage.clone(),
                    bonus_damage: payload.bonus_damage.clone(),
                    hit_results: payload.hit_results.clone(),
                },
                &services.plugins,
                services.targets.as_ref(),
            )?,
        };
        ctx.base.half = payload.half;
        with_session(state, services, |session| ctx.hydrate(session))?;
        state.payload.context = Some(ctx);
        Ok(true)
    }
}

/// Rolls every formula and counts overkill heat.
#[derive(Debug, Clone, Copy)]
pub struct RollDamage;

#[async_trait]
impl Step<DamagePayload> for RollDamage {
    async fn run(
        &self,
        state: &mut FlowState<DamagePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let ctx = state
            .payload
            .context
            .as_ref()
            .ok_or_else(|| RollError::NotHydrated("damage context".into()))?;
        let overkill = ctx.weapon.as_ref().is_some_and(|w| w.overkill);
        let half = ctx.base.half;

        let mut results = Vec::new();
        let mut overkill_heat = 0;
        for formula in ctx.formulas()? {
            let mut parts = Vec::with_capacity(formula.parts.len());
            for (kind, text) in &formula.parts {
                let roll = services.evaluator.evaluate(text)?;
                if overkill {
                    overkill_heat += i32::try_from(roll.count_of(1)).unwrap_or(i32::MAX);
                }
                parts.push(DamagePart { kind: *kind, roll });
            }
            let sum: i32 = parts.iter().map(|p| p.roll.total.max(0)).sum();
            let total = if half { (sum + 1) / 2 } else { sum };
            tracing::debug!(target_token = ?formula.token, total, "damage rolled");
            results.push(DamageResult {
                token: formula.token,
                hit: formula.hit,
                crit: formula.crit,
                parts,
                total,
            });
        }
        state.payload.results = results;
        state.payload.overkill_heat = overkill_heat;
        Ok(true)
    }
}

/// Applies overkill heat to the attacker.
#[derive(Debug, Clone, Copy)]
pub struct OverkillHeat;

#[async_trait]
impl Step<DamagePayload> for OverkillHeat {
    async fn run(
        &self,
        state: &mut FlowState<DamagePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let heat = state.payload.overkill_heat;
        if heat == 0 || !services.config.overkill_heat {
            return Ok(true);
        }
        tracing::debug!(actor = %state.actor.name, heat, "overkill heat");
        let patch = EntityPatch {
            heat: Some(state.actor.heat.value + heat),
            ..EntityPatch::default()
        };
        update_actor(state, services, patch)?;
        Ok(true)
    }
}

/// Appends the damage roll to the history.
#[derive(Debug, Clone, Copy)]
pub struct RecordDamage;

#[async_trait]
impl Step<DamagePayload> for RecordDamage {
    async fn run(
        &self,
        state: &mut FlowState<DamagePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let mut action =
            ActionRecord::new(ActionKind::Damage).with_hits(state.payload.hit_results.clone());
        if let Some(item) = &state.item {
            action = action.with_item(item);
        }
        if let Some(ctx) = &state.payload.context {
            action = action.with_snapshot(ctx.to_object()?);
        }
        record_action(state, services, action);
        Ok(true)
    }
}

/// Rolls damage for an attack's hits, or untargeted damage.
#[derive(Debug)]
pub struct DamageFlow;

impl FlowKind for DamageFlow {
    type Payload = DamagePayload;
    const NAME: &'static str = "DamageRollFlow";

    fn steps() -> StepSequence<DamagePayload> {
        StepSequence::new()
            .with(INIT, StepRef::step(InitDamage))
            .with(ROLL, StepRef::step(RollDamage))
            .with(OVERKILL_HEAT, StepRef::step(OverkillHeat))
            .with(RECORD, StepRef::step(RecordDamage))
            .with(RENDER, StepRef::step(RenderMessage))
    }
}
