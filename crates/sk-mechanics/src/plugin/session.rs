use sk_core::{
    AutomationConfig, Condition, Entity, Item, TargetHandle, TargetProvider, TokenId,
    WeaponProfile,
};
use sk_history::{ActionHistory, ActionRecord};

use super::def::Scope;
use super::instance::PluginData;

/// Live state a roll context hydrates against.
#[derive(Clone, Copy)]
pub struct RollSession<'a> {
    /// The acting combatant.
    pub actor: &'a Entity,
    /// The item being used, if any.
    pub item: Option<&'a Item>,
    /// The action history.
    pub history: &'a ActionHistory,
    /// Automation toggles.
    pub config: &'a AutomationConfig,
    /// Scene access for tokens, distances, and cover.
    pub targets: &'a dyn TargetProvider,
}

impl<'a> RollSession<'a> {
    /// A session for an actor acting without an item.
    pub fn new(
        actor: &'a Entity,
        history: &'a ActionHistory,
        config: &'a AutomationConfig,
        targets: &'a dyn TargetProvider,
    ) -> Self {
        Self {
            actor,
            item: None,
            history,
            config,
            targets,
        }
    }

    /// Attach the item being used.
    pub fn with_item(mut self, item: Option<&'a Item>) -> Self {
        self.item = item;
        self
    }

    /// The hydration context for one plugin in one container.
    pub fn ctx<'b>(
        &'b self,
        scope: Scope,
        target: Option<&'b TargetHandle>,
        data: &'b PluginData,
    ) -> HydrateCtx<'b> {
        HydrateCtx {
            actor: self.actor,
            item: self.item,
            history: self.history,
            config: self.config,
            targets: self.targets,
            scope,
            target,
            data,
        }
    }
}

/// Everything a plugin predicate may consult while hydrating.
#[derive(Clone, Copy)]
pub struct HydrateCtx<'a> {
    /// The acting combatant.
    pub actor: &'a Entity,
    /// The item being used, if any.
    pub item: Option<&'a Item>,
    /// The action history.
    pub history: &'a ActionHistory,
    /// Automation toggles.
    pub config: &'a AutomationConfig,
    /// Scene access.
    pub targets: &'a dyn TargetProvider,
    /// The container scope the plugin is hydrating in.
    pub scope: Scope,
    /// The target owning the container, for per-target plugins.
    pub target: Option<&'a TargetHandle>,
    /// The plugin's persisted data.
    pub data: &'a PluginData,
}

impl HydrateCtx<'_> {
    /// The weapon profile of the item in use, if it is a weapon.
    pub fn weapon(&self) -> Option<&WeaponProfile> {
        self.item.and_then(|i| i.weapon_profile())
    }

    /// Whether the owning target has a condition. False without a target.
    pub fn target_has(&self, condition: Condition) -> bool {
        self.target.is_some_and(|t| t.has_condition(condition))
    }

    /// The actor's token on the active scene.
    pub fn actor_token(&self) -> Option<TokenId> {
        self.targets.token_for(self.actor.id)
    }

    /// Distance from the actor's token to the owning target.
    pub fn distance_to_target(&self) -> Option<u32> {
        let target = self.target?;
        self.targets.distance(self.actor_token()?, target.token)
    }

    /// Actions the actor resolved this turn, oldest first.
    pub fn current_turn_actions(&self) -> Vec<&ActionRecord> {
        self.history.current_turn_actions(self.actor.id)
    }

    /// An integer field from the plugin's persisted data.
    pub fn field_int(&self, name: &str) -> Option<i64> {
        self.data.fields.get(name).and_then(|v| v.as_i64())
    }
}
