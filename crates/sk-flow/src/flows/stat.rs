//! Stat checks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_core::Stat;
use sk_history::{ActionKind, ActionRecord};
use sk_mechanics::{Roll, accuracy_formula};

use super::attack::{INIT, ROLL};
use crate::chat::Template;
use crate::error::FlowResult;
use crate::flow::FlowKind;
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{Step, StepRef, StepSequence};
use crate::steps::{RECORD, RENDER, Render, RenderMessage, precondition_failed, record_action};

/// A check succeeds at or above this total.
pub const CHECK_TARGET: i32 = 10;

/// State of a stat check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatPayload {
    /// The stat being checked.
    pub stat: Option<Stat>,
    /// Roll title.
    pub title: String,
    /// The stat value added to the roll.
    pub bonus: i32,
    /// Extra accuracy.
    pub accuracy: i32,
    /// Extra difficulty.
    pub difficulty: i32,
    /// The evaluated roll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<Roll>,
    /// Whether the check succeeded.
    pub success: bool,
}

impl StatPayload {
    /// A check of the given stat.
    pub fn new(stat: Stat) -> Self {
        Self {
            stat: Some(stat),
            ..Self::default()
        }
    }
}

impl Render for StatPayload {
    fn template(&self) -> Template {
        Template::Stat
    }
}

/// Reads the stat value from the actor.
#[derive(Debug, Clone, Copy)]
pub struct InitStat;

#[async_trait]
impl Step<StatPayload> for InitStat {
    async fn run(
        &self,
        state: &mut FlowState<StatPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(stat) = state.payload.stat else {
            return Ok(precondition_failed(state, services, "no stat selected"));
        };
        state.payload.bonus = state.actor.stat(stat);
        if state.payload.title.is_empty() {
            state.payload.title = format!("{stat} check");
        }
        Ok(true)
    }
}

/// Rolls the check.
#[derive(Debug, Clone, Copy)]
pub struct RollStat;

#[async_trait]
impl Step<StatPayload> for RollStat {
    async fn run(
        &self,
        state: &mut FlowState<StatPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let p = &state.payload;
        let formula = accuracy_formula(p.bonus, p.accuracy - p.difficulty);
        let roll = services.evaluator.evaluate(&formula)?;
        state.payload.success = roll.total >= CHECK_TARGET;
        state.payload.roll = Some(roll);
        Ok(true)
    }
}

/// Appends the check to the history.
#[derive(Debug, Clone, Copy)]
pub struct RecordStat;

#[async_trait]
impl Step<StatPayload> for RecordStat {
    async fn run(
        &self,
        state: &mut FlowState<StatPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let snapshot = serde_json::json!({
            "stat": state.payload.stat,
            "total": state.payload.roll.as_ref().map(|r| r.total),
            "success": state.payload.success,
        });
        record_action(
            state,
            services,
            ActionRecord::new(ActionKind::Stat).with_snapshot(snapshot),
        );
        Ok(true)
    }
}

/// A stat check against a fixed target.
#[derive(Debug)]
pub struct StatRollFlow;

impl FlowKind for StatRollFlow {
    type Payload = StatPayload;
    const NAME: &'static str = "StatRollFlow";

    fn steps() -> StepSequence<StatPayload> {
        StepSequence::new()
            .with(INIT, StepRef::step(InitStat))
            .with(ROLL, StepRef::step(RollStat))
            .with(RECORD, StepRef::step(RecordStat))
            .with(RENDER, StepRef::step(RenderMessage))
    }
}
