use std::sync::Arc;

use sk_core::{AutomationConfig, DocRef, Encounter, EntityProvider, TargetProvider};
use sk_history::{ActionHistory, SharedHistory};
use sk_mechanics::plugins::default_registry;
use sk_mechanics::{DiceEvaluator, PluginRegistry, RollEvaluator};

use crate::chat::{ChatSink, MemoryChat};
use crate::error::FlowResult;
use crate::flow::{DynFlow, Flow, FlowKind, SerializedFlow};
use crate::hud::HudSurface;
use crate::registry::FlowRegistry;

/// The collaborators every flow runs against.
pub struct FlowServices {
    /// Combatant and item lookup and updates.
    pub entities: Arc<dyn EntityProvider>,
    /// Scene access.
    pub targets: Arc<dyn TargetProvider>,
    /// Dice.
    pub evaluator: Arc<dyn RollEvaluator>,
    /// Where results go.
    pub chat: Arc<dyn ChatSink>,
    /// The modifier-editing surface.
    pub hud: Arc<HudSurface>,
    /// The action history.
    pub history: SharedHistory,
    /// Roll plugins.
    pub plugins: Arc<PluginRegistry>,
    /// Flow kinds and their base step sequences.
    pub flows: FlowRegistry,
    /// Automation toggles.
    pub config: AutomationConfig,
}

impl std::fmt::Debug for FlowServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowServices")
            .field("plugins", &self.plugins.len())
            .field("flows", &self.flows)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FlowServices {
    /// Start building services over the given providers.
    pub fn builder(
        entities: Arc<dyn EntityProvider>,
        targets: Arc<dyn TargetProvider>,
    ) -> FlowServicesBuilder {
        FlowServicesBuilder {
            entities,
            targets,
            evaluator: None,
            chat: None,
            hud: None,
            history: None,
            plugins: None,
            flows: None,
            config: AutomationConfig::default(),
        }
    }

    /// Start building services backed by an in-memory encounter.
    pub fn for_encounter(encounter: Arc<Encounter>) -> FlowServicesBuilder {
        let targets: Arc<dyn TargetProvider> = encounter.clone();
        Self::builder(encounter, targets)
    }

    /// Create a flow of kind `K`.
    pub fn flow<K: FlowKind>(
        self: &Arc<Self>,
        source: &DocRef,
        payload: K::Payload,
    ) -> FlowResult<Flow<K>> {
        Flow::new(source, payload, Arc::clone(self))
    }

    /// Rebuild a serialized flow of any registered kind.
    pub fn restore(self: &Arc<Self>, data: SerializedFlow) -> FlowResult<Box<dyn DynFlow>> {
        self.flows.deserialize(data, Arc::clone(self))
    }
}

/// Builder for [`FlowServices`]. Unset collaborators get in-memory defaults.
pub struct FlowServicesBuilder {
    entities: Arc<dyn EntityProvider>,
    targets: Arc<dyn TargetProvider>,
    evaluator: Option<Arc<dyn RollEvaluator>>,
    chat: Option<Arc<dyn ChatSink>>,
    hud: Option<Arc<HudSurface>>,
    history: Option<SharedHistory>,
    plugins: Option<Arc<PluginRegistry>>,
    flows: Option<FlowRegistry>,
    config: AutomationConfig,
}

impl FlowServicesBuilder {
    /// Set the automation config. The default evaluator is seeded from it.
    pub fn with_config(mut self, config: AutomationConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dice evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn RollEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Set the chat sink.
    pub fn with_chat(mut self, chat: Arc<dyn ChatSink>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Set the HUD surface.
    pub fn with_hud(mut self, hud: Arc<HudSurface>) -> Self {
        self.hud = Some(hud);
        self
    }

    /// Set the action history.
    pub fn with_history(mut self, history: SharedHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Set the plugin registry.
    pub fn with_plugins(mut self, plugins: Arc<PluginRegistry>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Set the flow registry.
    pub fn with_flows(mut self, flows: FlowRegistry) -> Self {
        self.flows = Some(flows);
        self
    }

    /// Finish building.
    pub fn build(self) -> Arc<FlowServices> {
        let config = self.config;
        Arc::new(FlowServices {
            entities: self.entities,
            targets: self.targets,
            evaluator: self
                .evaluator
                .unwrap_or_else(|| Arc::new(DiceEvaluator::from_config(&config))),
            chat: self.chat.unwrap_or_else(|| Arc::new(MemoryChat::new())),
            hud: self.hud.unwrap_or_default(),
            history: self.history.unwrap_or_else(ActionHistory::shared),
            plugins: self
                .plugins
                .unwrap_or_else(|| Arc::new(default_registry())),
            flows: self.flows.unwrap_or_else(FlowRegistry::with_defaults),
            config,
        })
    }
}
