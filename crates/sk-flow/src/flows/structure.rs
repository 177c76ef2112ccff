//! Structure damage and the system trauma it can cause.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_core::{Condition, EntityPatch, ItemKind, ItemPatch, Track};
use sk_history::{ActionKind, ActionRecord};
use sk_mechanics::Roll;

use super::attack::ROLL;
use crate::chat::Template;
use crate::error::{FlowError, FlowResult};
use crate::flow::{FlowKind, SubFlow};
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{Step, StepRef, StepSequence};
use crate::steps::{
    RECORD, RENDER, Render, RenderMessage, precondition_failed, record_action, update_actor,
};

/// Key of the structure precondition step.
pub const CHECK: &str = "check";
/// Key of the track decrement step.
pub const DAMAGE: &str = "damage";
/// Key of the step applying the table result.
pub const APPLY: &str = "apply";
/// Key of the nested system trauma flow.
pub const SYSTEM_TRAUMA: &str = "system_trauma";

/// Roll `Nd6kl1` where `N` is how far the track is below its maximum, at
/// least one.
pub(crate) fn table_roll(services: &FlowServices, track: Track) -> FlowResult<Roll> {
    let dice = track.missing().max(1);
    Ok(services.evaluator.evaluate(&format!("{dice}d6kl1"))?)
}

/// Refuses combatants without structure and stress.
#[derive(Debug, Clone, Copy)]
pub struct RequireStructure;

#[async_trait]
impl<P: Send> Step<P> for RequireStructure {
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        if state.actor.kind.has_structure() {
            return Ok(true);
        }
        let reason = format!("{} has no structure or stress", state.actor.name);
        Ok(precondition_failed(state, services, &reason))
    }
}

/// A structure table result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureOutcome {
    /// 5-6: impaired until the end of the next turn.
    GlancingBlow,
    /// 2-4: a weapon or system is destroyed.
    SystemTrauma,
    /// 1: consequences scale with remaining structure.
    DirectHit,
    /// Multiple 1s: the mech is destroyed.
    CrushingHit,
    /// No structure left.
    Destroyed,
}

impl fmt::Display for StructureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GlancingBlow => "Glancing Blow",
            Self::SystemTrauma => "System Trauma",
            Self::DirectHit => "Direct Hit",
            Self::CrushingHit => "Crushing Hit",
            Self::Destroyed => "Destroyed",
        };
        f.write_str(name)
    }
}

impl StructureOutcome {
    /// Read the table for a roll with the given structure remaining.
    pub fn from_roll(roll: &Roll, remaining: i32) -> Self {
        if roll.count_of(1) >= 2 {
            return Self::CrushingHit;
        }
        match roll.total {
            i32::MIN..=1 if remaining <= 1 => Self::Destroyed,
            i32::MIN..=1 => Self::DirectHit,
            2..=4 => Self::SystemTrauma,
            _ => Self::GlancingBlow,
        }
    }

    /// Conditions the result inflicts.
    pub fn conditions(self, remaining: i32) -> Vec<Condition> {
        match self {
            Self::GlancingBlow => vec![Condition::Impaired],
            Self::DirectHit if remaining == 2 => vec![Condition::Stunned],
            Self::DirectHit => vec![Condition::Impaired],
            Self::SystemTrauma | Self::CrushingHit | Self::Destroyed => Vec::new(),
        }
    }
}

/// State of a structure check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructurePayload {
    /// Structure left after the hit.
    pub remaining: i32,
    /// The table roll; absent when the mech was destroyed outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<Roll>,
    /// The table result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StructureOutcome>,
    /// Conditions applied to the actor.
    pub conditions: Vec<Condition>,
}

impl Render for StructurePayload {
    fn template(&self) -> Template {
        Template::Structure
    }
}

/// Marks one structure as lost.
#[derive(Debug, Clone, Copy)]
pub struct DamageStructure;

#[async_trait]
impl Step<StructurePayload> for DamageStructure {
    async fn run(
        &self,
        state: &mut FlowState<StructurePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        if services.config.structure_automation {
            let patch = EntityPatch {
                structure: Some(state.actor.structure.value - 1),
                ..EntityPatch::default()
            };
            update_actor(state, services, patch)?;
        }
        state.payload.remaining = state.actor.structure.value;
        tracing::debug!(actor = %state.actor.name, remaining = state.payload.remaining, "structure lost");
        Ok(true)
    }
}

/// Rolls on the structure table.
#[derive(Debug, Clone, Copy)]
pub struct RollStructure;

#[async_trait]
impl Step<StructurePayload> for RollStructure {
    async fn run(
        &self,
        state: &mut FlowState<StructurePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let remaining = state.payload.remaining;
        if remaining <= 0 {
            state.payload.roll = None;
            state.payload.outcome = Some(StructureOutcome::Destroyed);
            return Ok(true);
        }
        let track = Track::new(remaining, state.actor.structure.max);
        let roll = table_roll(services, track)?;
        state.payload.outcome = Some(StructureOutcome::from_roll(&roll, remaining));
        state.payload.roll = Some(roll);
        Ok(true)
    }
}

/// Applies the conditions a result inflicts.
#[derive(Debug, Clone, Copy)]
pub struct ApplyStructure;

#[async_trait]
impl Step<StructurePayload> for ApplyStructure {
    async fn run(
        &self,
        state: &mut FlowState<StructurePayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(outcome) = state.payload.outcome else {
            return Ok(true);
        };
        let conditions = outcome.conditions(state.payload.remaining);
        if services.config.structure_automation && !conditions.is_empty() {
            let patch = EntityPatch {
                add_conditions: conditions.clone(),
                ..EntityPatch::default()
            };
            update_actor(state, services, patch)?;
        }
        tracing::info!(actor = %state.actor.name, %outcome, "structure result");
        state.payload.conditions = conditions;
        Ok(true)
    }
}

/// Appends a structure or overheat result to the history.
#[derive(Debug, Clone, Copy)]
pub struct RecordTable(pub ActionKind);

#[async_trait]
impl<P: Serialize + Send + Sync> Step<P> for RecordTable {
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let snapshot =
            serde_json::to_value(&state.payload).map_err(|e| FlowError::Payload {
                flow: state.name.clone(),
                reason: e.to_string(),
            })?;
        record_action(
            state,
            services,
            ActionRecord::new(self.0).with_snapshot(snapshot),
        );
        Ok(true)
    }
}

/// Loses one structure and rolls on the structure table.
#[derive(Debug)]
pub struct StructureFlow;

impl FlowKind for StructureFlow {
    type Payload = StructurePayload;
    const NAME: &'static str = "StructureFlow";

    fn steps() -> StepSequence<StructurePayload> {
        let trauma = SubFlow::<SystemTraumaFlow, StructurePayload>::new(|parent| {
            (parent.payload.outcome == Some(StructureOutcome::SystemTrauma))
                .then(TraumaPayload::default)
        });
        StepSequence::new()
            .with(CHECK, StepRef::step(RequireStructure))
            .with(DAMAGE, StepRef::step(DamageStructure))
            .with(ROLL, StepRef::step(RollStructure))
            .with(APPLY, StepRef::step(ApplyStructure))
            .with(SYSTEM_TRAUMA, StepRef::flow(trauma))
            .with(RECORD, StepRef::step(RecordTable(ActionKind::Structure)))
            .with(RENDER, StepRef::step(RenderMessage))
    }
}

/// Which kind of gear system trauma hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraumaTarget {
    /// 1-3: a weapon.
    Weapon,
    /// 4-6: a system.
    System,
}

/// State of a system trauma roll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraumaPayload {
    /// The d6 roll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<Roll>,
    /// What the roll hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TraumaTarget>,
    /// Name of the destroyed item, if any was left to destroy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroyed: Option<String>,
}

impl Render for TraumaPayload {
    fn template(&self) -> Template {
        Template::SystemTrauma
    }
}

/// Rolls 1d6 and destroys the first intact weapon or system.
#[derive(Debug, Clone, Copy)]
pub struct RollTrauma;

#[async_trait]
impl Step<TraumaPayload> for RollTrauma {
    async fn run(
        &self,
        state: &mut FlowState<TraumaPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let roll = services.evaluator.evaluate("1d6")?;
        let target = if roll.total <= 3 {
            TraumaTarget::Weapon
        } else {
            TraumaTarget::System
        };
        let is_target = |kind: &ItemKind| match target {
            TraumaTarget::Weapon => matches!(kind, ItemKind::Weapon(_)),
            TraumaTarget::System => matches!(kind, ItemKind::System(_)),
        };
        let victim = state
            .actor
            .items
            .iter()
            .find(|i| !i.destroyed && is_target(&i.kind))
            .map(|i| (i.id, i.name.clone()));

        state.payload.roll = Some(roll);
        state.payload.target = Some(target);
        if let Some((id, name)) = victim {
            if services.config.structure_automation {
                let mut item = ItemPatch::new(id);
                item.destroyed = Some(true);
                let patch = EntityPatch {
                    items: vec![item],
                    ..EntityPatch::default()
                };
                update_actor(state, services, patch)?;
            }
            tracing::info!(actor = %state.actor.name, item = %name, "system trauma");
            state.payload.destroyed = Some(name);
        }
        Ok(true)
    }
}

/// Destroys a weapon or system after a structure hit.
#[derive(Debug)]
pub struct SystemTraumaFlow;

impl FlowKind for SystemTraumaFlow {
    type Payload = TraumaPayload;
    const NAME: &'static str = "SystemTraumaFlow";

    fn steps() -> StepSequence<TraumaPayload> {
        StepSequence::new()
            .with(ROLL, StepRef::step(RollTrauma))
            .with(RENDER, StepRef::step(RenderMessage))
    }
}
