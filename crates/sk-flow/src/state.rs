use serde::Serialize;
use sk_core::{DocRef, Entity, EntityProvider, Item, Resolved};

use crate::error::{FlowError, FlowResult};
use crate::flow::SerializedFlow;

/// The shared record every step of a flow reads and mutates.
#[derive(Debug, Clone)]
pub struct FlowState<P> {
    /// Name of the flow kind.
    pub name: String,
    /// The reference the flow was created from.
    pub source: DocRef,
    /// The acting combatant.
    pub actor: Entity,
    /// The item being used, if the flow was started from one.
    pub item: Option<Item>,
    /// Flow-specific data.
    pub payload: P,
}

impl<P> FlowState<P> {
    /// Build a state from a resolved source reference.
    pub fn new(name: impl Into<String>, resolved: Resolved, payload: P) -> Self {
        let source = resolved.doc_ref();
        let (actor, item) = resolved.into_parts();
        Self {
            name: name.into(),
            source,
            actor,
            item,
            payload,
        }
    }

    /// Re-read the actor and item after an update.
    pub fn reload(&mut self, entities: &dyn EntityProvider) -> FlowResult<()> {
        let (actor, item) = entities.resolve(&self.source)?.into_parts();
        self.actor = actor;
        self.item = item;
        Ok(())
    }
}

impl<P: Serialize> FlowState<P> {
    /// Encode the state for a reroll.
    pub fn snapshot(&self) -> FlowResult<SerializedFlow> {
        let payload = serde_json::to_value(&self.payload).map_err(|e| FlowError::Payload {
            flow: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(SerializedFlow {
            name: self.name.clone(),
            source_uuid: self.source.to_string(),
            payload,
        })
    }
}
