//! Steps shared by several flow kinds.

use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use sk_core::item::{TAG_HEAT_SELF, TAG_LIMITED, TAG_LOADING};
use sk_core::{EntityPatch, ItemKind, ItemPatch};
use sk_history::ActionRecord;
use sk_mechanics::RollSession;

use crate::chat::{ChatFlags, ChatMessage, Template};
use crate::error::FlowResult;
use crate::flow::SerializedFlow;
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::Step;

/// Key of the item precondition step.
pub const CHECK_ITEM: &str = "check_item";
/// Key of the self-heat step.
pub const SELF_HEAT: &str = "self_heat";
/// Key of the resource consumption step.
pub const CONSUME: &str = "consume";
/// Key of the history step.
pub const RECORD: &str = "record";
/// Key of the chat step.
pub const RENDER: &str = "render";

/// Abort cleanly with a user-visible warning.
pub(crate) fn precondition_failed<P>(
    state: &FlowState<P>,
    services: &FlowServices,
    reason: &str,
) -> bool {
    tracing::warn!(flow = %state.name, actor = %state.actor.name, reason, "precondition failed");
    services.chat.warn(&state.actor, reason);
    false
}

/// Run `f` with a roll session over the current state. The history lock is
/// held only for the duration of the call.
pub(crate) fn with_session<P, R>(
    state: &FlowState<P>,
    services: &FlowServices,
    f: impl FnOnce(&RollSession<'_>) -> R,
) -> R {
    let history = services.history.read().unwrap_or_else(PoisonError::into_inner);
    let session = RollSession::new(
        &state.actor,
        &history,
        &services.config,
        services.targets.as_ref(),
    )
    .with_item(state.item.as_ref());
    f(&session)
}

/// Append an action to the history. A missing round or turn is logged and
/// otherwise ignored.
pub(crate) fn record_action<P>(state: &FlowState<P>, services: &FlowServices, action: ActionRecord) {
    let mut history = services.history.write().unwrap_or_else(PoisonError::into_inner);
    match history.record(state.actor.id, action) {
        Ok(()) => tracing::debug!(actor = %state.actor.name, "action recorded"),
        Err(e) => tracing::warn!(actor = %state.actor.name, error = %e, "action not recorded"),
    }
}

/// Apply a patch to the actor and refresh the state.
pub(crate) fn update_actor<P>(
    state: &mut FlowState<P>,
    services: &FlowServices,
    patch: EntityPatch,
) -> FlowResult<()> {
    if patch.is_empty() {
        return Ok(());
    }
    services.entities.update(state.actor.id, patch)?;
    state.reload(services.entities.as_ref())
}

/// What kind of item a flow needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRequirement {
    /// A weapon that can fire.
    Weapon,
    /// A system that can be activated.
    System,
}

/// Refuses destroyed, unloaded, or exhausted items.
#[derive(Debug, Clone, Copy)]
pub struct CheckItem(pub ItemRequirement);

#[async_trait]
impl<P: Send> Step<P> for CheckItem {
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(item) = &state.item else {
            return Ok(precondition_failed(state, services, "no item selected"));
        };
        let reason = match (self.0, &item.kind) {
            (ItemRequirement::Weapon, ItemKind::System(_)) => Some(format!("{} is not a weapon", item.name)),
            (ItemRequirement::System, ItemKind::Weapon(_)) => Some(format!("{} is not a system", item.name)),
            _ if item.destroyed => Some(format!("{} is destroyed", item.name)),
            _ if item.is_unloaded() => Some(format!("{} is not loaded", item.name)),
            _ if item.is_exhausted() => Some(format!("{} has no uses left", item.name)),
            _ => None,
        };
        Ok(match reason {
            Some(reason) => precondition_failed(state, services, &reason),
            None => true,
        })
    }
}

/// Adds the item's self-heat to the actor.
#[derive(Debug, Clone, Copy)]
pub struct SelfHeat;

#[async_trait]
impl<P: Send> Step<P> for SelfHeat {
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(heat) = state.item.as_ref().and_then(|i| i.tag_value(TAG_HEAT_SELF)) else {
            return Ok(true);
        };
        let current = state.actor.heat;
        let next = current.value + heat;
        if next > current.max {
            tracing::info!(actor = %state.actor.name, heat = next, cap = current.max, "heat cap exceeded");
        }
        update_actor(
            state,
            services,
            EntityPatch {
                heat: Some(next),
                ..EntityPatch::default()
            },
        )?;
        Ok(true)
    }
}

/// Unloads loading weapons and spends limited uses, as configured.
#[derive(Debug, Clone, Copy)]
pub struct ConsumeItem;

#[async_trait]
impl<P: Send> Step<P> for ConsumeItem {
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(item) = &state.item else {
            return Ok(true);
        };
        let mut patch = ItemPatch::new(item.id);
        if services.config.consume_loading && item.has_tag(TAG_LOADING) {
            patch.loaded = Some(false);
        }
        if services.config.consume_limited_uses && item.has_tag(TAG_LIMITED) {
            patch.uses = item.uses.map(|u| u.value - 1);
        }
        if patch == ItemPatch::new(item.id) {
            return Ok(true);
        }
        tracing::debug!(item = %item.name, "consuming item resources");
        update_actor(
            state,
            services,
            EntityPatch {
                items: vec![patch],
                ..EntityPatch::default()
            },
        )?;
        Ok(true)
    }
}

/// A payload that renders to chat.
pub trait Render: Serialize + Sized {
    /// The card template.
    fn template(&self) -> Template;

    /// A flow the result leads into.
    fn follow_up(_state: &FlowState<Self>) -> FlowResult<Option<SerializedFlow>> {
        Ok(None)
    }
}

/// Hands the payload to the chat sink with reroll and follow-up flags.
#[derive(Debug, Clone, Copy)]
pub struct RenderMessage;

#[async_trait]
impl<P: Render + Send + Sync> Step<P> for RenderMessage {
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let reroll = state.snapshot()?;
        let message = ChatMessage {
            actor: state.actor.id,
            speaker: state.actor.name.clone(),
            template: state.payload.template(),
            data: reroll.payload.clone(),
            flags: ChatFlags {
                follow_up: P::follow_up(state)?,
                reroll: Some(reroll),
            },
        };
        services.chat.render(message);
        Ok(true)
    }
}
