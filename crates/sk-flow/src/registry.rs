use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{FlowError, FlowResult};
use crate::flow::{DynFlow, Flow, FlowKind, SerializedFlow};
use crate::flows;
use crate::services::FlowServices;
use crate::step::StepSequence;

type Restore = fn(SerializedFlow, Arc<FlowServices>) -> FlowResult<Box<dyn DynFlow>>;

struct Entry {
    sequence: Box<dyn Any + Send + Sync>,
    restore: Restore,
}

fn restore<K: FlowKind>(
    data: SerializedFlow,
    services: Arc<FlowServices>,
) -> FlowResult<Box<dyn DynFlow>> {
    Ok(Box::new(Flow::<K>::deserialize(data, services)?))
}

/// The registered flow kinds and their base step sequences.
///
/// Editing a base sequence affects every flow of that kind created afterwards.
#[derive(Default)]
pub struct FlowRegistry {
    kinds: RwLock<HashMap<&'static str, Entry>>,
}

impl std::fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRegistry")
            .field("kinds", &self.names())
            .finish()
    }
}

impl FlowRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in flow kind.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register::<flows::WeaponAttackFlow>();
        registry.register::<flows::BasicAttackFlow>();
        registry.register::<flows::TechAttackFlow>();
        registry.register::<flows::DamageFlow>();
        registry.register::<flows::StatRollFlow>();
        registry.register::<flows::StructureFlow>();
        registry.register::<flows::OverheatFlow>();
        registry.register::<flows::SystemTraumaFlow>();
        registry.register::<flows::ActivationFlow>();
        registry
    }

    /// Register a flow kind with its default steps. Returns `false` if the
    /// name was already registered.
    pub fn register<K: FlowKind>(&self) -> bool {
        let mut kinds = self.kinds.write().unwrap_or_else(PoisonError::into_inner);
        if kinds.contains_key(K::NAME) {
            return false;
        }
        kinds.insert(
            K::NAME,
            Entry {
                sequence: Box::new(K::steps()),
                restore: restore::<K>,
            },
        );
        tracing::debug!(flow = K::NAME, "flow registered");
        true
    }

    /// Registered flow names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = kinds.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// A copy of the base sequence for `K`, or its defaults if unregistered.
    pub fn sequence<K: FlowKind>(&self) -> StepSequence<K::Payload> {
        let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
        kinds
            .get(K::NAME)
            .and_then(|e| e.sequence.downcast_ref::<StepSequence<K::Payload>>())
            .cloned()
            .unwrap_or_else(K::steps)
    }

    /// Edit the base sequence for `K`.
    pub fn modify<K: FlowKind>(
        &self,
        edit: impl FnOnce(&mut StepSequence<K::Payload>) -> FlowResult<()>,
    ) -> FlowResult<()> {
        let mut kinds = self.kinds.write().unwrap_or_else(PoisonError::into_inner);
        let sequence = kinds
            .get_mut(K::NAME)
            .and_then(|e| e.sequence.downcast_mut::<StepSequence<K::Payload>>())
            .ok_or_else(|| FlowError::UnknownFlow(K::NAME.to_string()))?;
        edit(sequence)
    }

    /// Rebuild a serialized flow of any registered kind.
    pub fn deserialize(
        &self,
        data: SerializedFlow,
        services: Arc<FlowServices>,
    ) -> FlowResult<Box<dyn DynFlow>> {
        let restore = {
            let kinds = self.kinds.read().unwrap_or_else(PoisonError::into_inner);
            kinds
                .get(data.name.as_str())
                .map(|e| e.restore)
                .ok_or_else(|| FlowError::UnknownFlow(data.name.clone()))?
        };
        restore(data, services)
    }
}
