use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sk_core::DocRef;

use crate::error::{FlowError, FlowResult};
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{NestedFlow, StepSequence};

/// A kind of flow: its name, payload shape, and default steps.
pub trait FlowKind: Send + Sync + 'static {
    /// Flow-specific state carried between steps.
    type Payload: Serialize + DeserializeOwned + Default + Send + Sync + 'static;

    /// Registration and serialization name.
    const NAME: &'static str;

    /// The default step sequence.
    fn steps() -> StepSequence<Self::Payload>;
}

/// Everything needed to rebuild a flow later, e.g. for a reroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFlow {
    /// The flow kind.
    pub name: String,
    /// The source reference, as a string.
    pub source_uuid: String,
    /// The encoded payload.
    pub payload: serde_json::Value,
}

/// A running instance of a flow kind.
pub struct Flow<K: FlowKind> {
    state: FlowState<K::Payload>,
    steps: StepSequence<K::Payload>,
    services: Arc<FlowServices>,
}

impl<K: FlowKind> std::fmt::Debug for Flow<K>
where
    K::Payload: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl<K: FlowKind> Flow<K> {
    /// Create a flow from a reference to a combatant or an owned item.
    ///
    /// The steps are copied from the registered sequence for `K`, so later
    /// registry edits do not affect this instance.
    pub fn new(
        source: &DocRef,
        payload: K::Payload,
        services: Arc<FlowServices>,
    ) -> FlowResult<Self> {
        let resolved = services.entities.resolve(source)?;
        let steps = services.flows.sequence::<K>();
        Ok(Self {
            state: FlowState::new(K::NAME, resolved, payload),
            steps,
            services,
        })
    }

    /// Rebuild a flow from its serialized form.
    pub fn deserialize(data: SerializedFlow, services: Arc<FlowServices>) -> FlowResult<Self> {
        if data.name != K::NAME {
            return Err(FlowError::UnknownFlow(data.name));
        }
        let source: DocRef = data.source_uuid.parse()?;
        let payload = serde_json::from_value(data.payload).map_err(|e| FlowError::Payload {
            flow: K::NAME.to_string(),
            reason: e.to_string(),
        })?;
        Self::new(&source, payload, services)
    }

    /// Encode the flow for a later reroll.
    pub fn serialize(&self) -> FlowResult<SerializedFlow> {
        self.state.snapshot()
    }

    /// The shared state.
    pub fn state(&self) -> &FlowState<K::Payload> {
        &self.state
    }

    /// The payload.
    pub fn payload(&self) -> &K::Payload {
        &self.state.payload
    }

    /// This instance's steps, for per-instance splicing.
    pub fn steps_mut(&mut self) -> &mut StepSequence<K::Payload> {
        &mut self.steps
    }

    /// Run every step in order. Returns `true` only if all of them completed.
    ///
    /// A given payload replaces the current one first. Nothing is rolled back
    /// when a step aborts.
    pub async fn begin(&mut self, payload: Option<K::Payload>) -> FlowResult<bool> {
        if let Some(payload) = payload {
            self.state.payload = payload;
        }
        tracing::debug!(flow = K::NAME, actor = %self.state.actor.name, "flow started");
        let completed = self.steps.run(&mut self.state, &self.services).await?;
        tracing::info!(flow = K::NAME, actor = %self.state.actor.name, completed, "flow finished");
        Ok(completed)
    }
}

/// A type-erased flow, as produced by [`FlowRegistry::deserialize`](crate::FlowRegistry::deserialize).
#[async_trait]
pub trait DynFlow: Send {
    /// The flow kind.
    fn name(&self) -> &str;

    /// Run the flow with its current payload.
    async fn run(&mut self) -> FlowResult<bool>;

    /// Encode the flow.
    fn to_serialized(&self) -> FlowResult<SerializedFlow>;

    /// The current payload, encoded.
    fn payload_value(&self) -> FlowResult<serde_json::Value> {
        Ok(self.to_serialized()?.payload)
    }
}

#[async_trait]
impl<K: FlowKind> DynFlow for Flow<K> {
    fn name(&self) -> &str {
        K::NAME
    }

    async fn run(&mut self) -> FlowResult<bool> {
        self.begin(None).await
    }

    fn to_serialized(&self) -> FlowResult<SerializedFlow> {
        self.serialize()
    }
}

type Gate<P, Q> = dyn Fn(&FlowState<P>) -> Option<Q> + Send + Sync;

/// Runs a flow of kind `K` as one step of a parent flow.
///
/// The gate derives the nested payload from the parent's state; returning
/// `None` skips the nested flow. The nested flow acts for the parent's actor.
pub struct SubFlow<K: FlowKind, P> {
    gate: Box<Gate<P, K::Payload>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: FlowKind, P> SubFlow<K, P> {
    /// A nested flow gated by a closure.
    pub fn new(
        gate: impl Fn(&FlowState<P>) -> Option<K::Payload> + Send + Sync + 'static,
    ) -> Self {
        Self {
            gate: Box::new(gate),
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: FlowKind, P: Send + Sync> NestedFlow<P> for SubFlow<K, P> {
    fn name(&self) -> &str {
        K::NAME
    }

    async fn run(
        &self,
        parent: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let Some(payload) = (self.gate)(parent) else {
            return Ok(true);
        };
        let source = DocRef::Actor(parent.actor.id);
        let mut flow = Flow::<K>::new(&source, payload, Arc::clone(services))?;
        let completed = flow.begin(None).await?;
        parent.reload(services.entities.as_ref())?;
        Ok(completed)
    }
}
