//! Overheating and the reactor stress table.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_core::{Condition, EntityPatch, Track};
use sk_history::ActionKind;
use sk_mechanics::Roll;

use super::attack::ROLL;
use super::structure::{APPLY, CHECK, DAMAGE, RecordTable, RequireStructure, table_roll};
use crate::chat::Template;
use crate::error::FlowResult;
use crate::flow::FlowKind;
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{Step, StepRef, StepSequence};
use crate::steps::{RECORD, RENDER, Render, RenderMessage, update_actor};

/// A stress table result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverheatOutcome {
    /// 5-6: impaired until the end of the next turn.
    EmergencyShunt,
    /// 2-4: exposed until cooled.
    DestabilizedPowerPlant,
    /// 1: exposed, and the reactor is failing.
    Meltdown,
    /// Multiple 1s: the reactor will explode.
    IrreversibleMeltdown,
    /// No stress left.
    ReactorMeltdown,
}

impl fmt::Display for OverheatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmergencyShunt => "Emergency Shunt",
            Self::DestabilizedPowerPlant => "Destabilized Power Plant",
            Self::Meltdown => "Meltdown",
            Self::IrreversibleMeltdown => "Irreversible Meltdown",
            Self::ReactorMeltdown => "Reactor Meltdown",
        };
        f.write_str(name)
    }
}

impl OverheatOutcome {
    /// Read the table for a roll with the given stress remaining.
    pub fn from_roll(roll: &Roll, remaining: i32) -> Self {
        if roll.count_of(1) >= 2 {
            return Self::IrreversibleMeltdown;
        }
        match roll.total {
            i32::MIN..=1 if remaining <= 1 => Self::ReactorMeltdown,
            i32::MIN..=1 => Self::Meltdown,
            2..=4 => Self::DestabilizedPowerPlant,
            _ => Self::EmergencyShunt,
        }
    }

    /// Conditions the result inflicts.
    pub fn conditions(self) -> Vec<Condition> {
        match self {
            Self::EmergencyShunt => vec![Condition::Impaired],
            Self::DestabilizedPowerPlant | Self::Meltdown | Self::IrreversibleMeltdown => {
                vec![Condition::Exposed]
            }
            Self::ReactorMeltdown => Vec::new(),
        }
    }
}

/// State of an overheat check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverheatPayload {
    /// Stress left after the overheat.
    pub remaining: i32,
    /// The table roll; absent when the reactor melted down outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<Roll>,
    /// The table result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OverheatOutcome>,
    /// Conditions applied to the actor.
    pub conditions: Vec<Condition>,
}

impl Render for OverheatPayload {
    fn template(&self) -> Template {
        Template::Overheat
    }
}

/// Loses one stress and vents all heat.
#[derive(Debug, Clone, Copy)]
pub struct DamageStress;

#[async_trait]
impl Step<OverheatPayload> for DamageStress {
    async fn run(
        &self,
        state: &mut FlowState<OverheatPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        if services.config.structure_automation {
            let patch = EntityPatch {
                stress: Some(state.actor.stress.value - 1),
                heat: Some(0),
                ..EntityPatch::default()
            };
            update_actor(state, services, patch)?;
        }
        state.payload.remaining = state.actor.stress.value;
        tracing::debug!(actor = %state.actor.name, remaining = state.payload.remaining, "stress lost");
        Ok(true)
    }
}

/// Rolls on the stress table.
#[derive(Debug, Clone, Copy)]
pub struct RollStress;

#[async_trait]
impl Step<OverheatPayload> for RollStress {
    async fn run(
        &self,
        state: &mut FlowState<OverheatPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let remaining = state.payload.remaining;
        if remaining <= 0 {
            state.payload.roll = None;
            state.payload.outcome = Some(OverheatOutcome::ReactorMeltdown);
            return Ok(true);
        }
        let track = Track::new(remaining, state.actor.stress.max);
        let roll = table_roll(services, track)?;
        state.payload.outcome = Some(OverheatOutcome::from_roll(&roll, remaining));
        state.payload.roll = Some(roll);
        Ok(true)
    }
}

/// Applies the conditions a result inflicts.
#[derive(Debug, Clone, Copy)]
pub struct ApplyStress;

#[async_trait]
impl Step<OverheatPayload> for ApplyStress {
    async fn run(
        &self,
        state: &mut FlowState<OverheatPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(outcome) = state.payload.outcome else {
            return Ok(true);
        };
        let conditions = outcome.conditions();
        if services.config.structure_automation && !conditions.is_empty() {
            let patch = EntityPatch {
                add_conditions: conditions.clone(),
                ..EntityPatch::default()
            };
            update_actor(state, services, patch)?;
        }
        tracing::info!(actor = %state.actor.name, %outcome, "stress result");
        state.payload.conditions = conditions;
        Ok(true)
    }
}

/// Loses one stress, vents heat and rolls on the stress table.
#[derive(Debug)]
pub struct OverheatFlow;

impl FlowKind for OverheatFlow {
    type Payload = OverheatPayload;
    const NAME: &'static str = "OverheatFlow";

    fn steps() -> StepSequence<OverheatPayload> {
        StepSequence::new()
            .with(CHECK, StepRef::step(RequireStructure))
            .with(DAMAGE, StepRef::step(DamageStress))
            .with(ROLL, StepRef::step(RollStress))
            .with(APPLY, StepRef::step(ApplyStress))
            .with(RECORD, StepRef::step(RecordTable(ActionKind::Overheat)))
            .with(RENDER, StepRef::step(RenderMessage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_mechanics::{DiceEvaluator, RollEvaluator};

    fn roll(faces: &[u32], formula: &str) -> Roll {
        DiceEvaluator::scripted(faces.to_vec())
            .evaluate(formula)
            .unwrap()
    }

    #[test]
    fn stress_table() {
        assert_eq!(
            OverheatOutcome::from_roll(&roll(&[5], "1d6kl1"), 3),
            OverheatOutcome::EmergencyShunt
        );
        assert_eq!(
            OverheatOutcome::from_roll(&roll(&[4, 2], "2d6kl1"), 2),
            OverheatOutcome::DestabilizedPowerPlant
        );
        assert_eq!(
            OverheatOutcome::from_roll(&roll(&[1, 3], "2d6kl1"), 2),
            OverheatOutcome::Meltdown
        );
        assert_eq!(
            OverheatOutcome::from_roll(&roll(&[1, 3, 3], "3d6kl1"), 1),
            OverheatOutcome::ReactorMeltdown
        );
        assert_eq!(
            OverheatOutcome::from_roll(&roll(&[1, 6, 1], "3d6kl1"), 1),
            OverheatOutcome::IrreversibleMeltdown
        );
    }

    #[test]
    fn shunt_impairs_and_meltdowns_expose() {
        assert_eq!(
            OverheatOutcome::EmergencyShunt.conditions(),
            vec![Condition::Impaired]
        );
        assert_eq!(
            OverheatOutcome::Meltdown.conditions(),
            vec![Condition::Exposed]
        );
        assert!(OverheatOutcome::ReactorMeltdown.conditions().is_empty());
    }
}
