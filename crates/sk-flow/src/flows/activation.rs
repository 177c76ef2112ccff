//! System activations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_core::ItemKind;
use sk_history::{ActionKind, ActionRecord};

use super::attack::INIT;
use crate::chat::Template;
use crate::error::FlowResult;
use crate::flow::FlowKind;
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{Step, StepRef, StepSequence};
use crate::steps::{
    CHECK_ITEM, CONSUME, CheckItem, ConsumeItem, ItemRequirement, RECORD, RENDER, Render,
    RenderMessage, SELF_HEAT, SelfHeat, record_action,
};

/// State of a system activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationPayload {
    /// Card title; defaults to the system name.
    pub title: String,
    /// Effect text; defaults to the system's effect.
    pub effect: String,
}

impl Render for ActivationPayload {
    fn template(&self) -> Template {
        Template::Activation
    }
}

/// Copies title and effect from the system.
#[derive(Debug, Clone, Copy)]
pub struct InitActivation;

#[async_trait]
impl Step<ActivationPayload> for InitActivation {
    async fn run(
        &self,
        state: &mut FlowState<ActivationPayload>,
        _services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(item) = &state.item else {
            return Ok(true);
        };
        if state.payload.title.is_empty() {
            state.payload.title = item.name.clone();
        }
        if let (true, ItemKind::System(profile)) = (state.payload.effect.is_empty(), &item.kind) {
            state.payload.effect = profile.effect.clone();
        }
        Ok(true)
    }
}

/// Appends the activation to the history.
#[derive(Debug, Clone, Copy)]
pub struct RecordActivation;

#[async_trait]
impl Step<ActivationPayload> for RecordActivation {
    async fn run(
        &self,
        state: &mut FlowState<ActivationPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let mut action = ActionRecord::new(ActionKind::Activation);
        if let Some(item) = &state.item {
            action = action.with_item(item);
        }
        record_action(state, services, action);
        Ok(true)
    }
}

/// Activates a system item.
#[derive(Debug)]
pub struct ActivationFlow;

impl FlowKind for ActivationFlow {
    type Payload = ActivationPayload;
    const NAME: &'static str = "ActivationFlow";

    fn steps() -> StepSequence<ActivationPayload> {
        StepSequence::new()
            .with(CHECK_ITEM, StepRef::step(CheckItem(ItemRequirement::System)))
            .with(INIT, StepRef::step(InitActivation))
            .with(SELF_HEAT, StepRef::step(SelfHeat))
            .with(CONSUME, StepRef::step(ConsumeItem))
            .with(RECORD, StepRef::step(RecordActivation))
            .with(RENDER, StepRef::step(RenderMessage))
    }
}
