use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sk_core::TargetHandle;

use super::def::{Activation, Family, PluginDef, Scope, UiBehavior};
use super::registry::PluginRegistry;
use super::session::{HydrateCtx, RollSession};
use crate::error::{RollError, RollResult};

/// The persisted half of a plugin instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginData {
    /// Explicit user toggle; `None` defers to automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_override: Option<bool>,
    /// Plugin-specific fields, validated against the plugin's schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// The live half of a plugin instance, derived by hydration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginState {
    /// Contributes to the roll.
    pub active: bool,
    /// Shown to the user.
    pub visible: bool,
    /// A reminder is flagged for the user.
    pub reminder_active: bool,
}

/// One plugin attached to one roll context container.
#[derive(Debug, Clone)]
pub struct PluginInstance {
    slug: String,
    data: PluginData,
    state: Option<PluginState>,
    def: Option<Arc<PluginDef>>,
    order: usize,
}

impl PluginInstance {
    /// A fresh, unhydrated instance of a registered plugin.
    pub fn new(def: Arc<PluginDef>, order: usize) -> Self {
        Self {
            slug: def.slug.clone(),
            data: PluginData::default(),
            state: None,
            def: Some(def),
            order,
        }
    }

    /// An instance decoded from persisted data, not yet bound to its plugin.
    pub fn unbound(slug: impl Into<String>, data: PluginData) -> Self {
        Self {
            slug: slug.into(),
            data,
            state: None,
            def: None,
            order: usize::MAX,
        }
    }

    /// The plugin slug.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// The persisted data.
    pub fn data(&self) -> &PluginData {
        &self.data
    }

    /// The plugin definition, once bound.
    pub fn def(&self) -> Option<&Arc<PluginDef>> {
        self.def.as_ref()
    }

    /// Whether hydration has run since the last change.
    pub fn is_hydrated(&self) -> bool {
        self.state.is_some()
    }

    /// Set or clear the user's explicit toggle. Requires re-hydration.
    pub fn set_override(&mut self, value: Option<bool>) {
        self.data.user_override = value;
        self.state = None;
    }

    /// Set a persisted field. Requires re-hydration.
    pub fn set_field(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.data.fields.insert(name.into(), value);
        self.state = None;
    }

    /// The live state.
    pub fn state(&self) -> RollResult<PluginState> {
        self.state
            .ok_or_else(|| RollError::NotHydrated(format!("plugin '{}'", self.slug)))
    }

    /// Whether the plugin currently contributes to the roll.
    pub fn is_active(&self) -> RollResult<bool> {
        Ok(self.state()?.active)
    }

    /// Accuracy contributed to the owning container's total.
    pub fn acc_bonus(&self) -> RollResult<i32> {
        let active = self.is_active()?;
        Ok(match &self.def {
            Some(def) if active => def.effect.accuracy,
            _ => 0,
        })
    }

    /// Rewrite ordering; higher runs first.
    pub fn precedence(&self) -> i32 {
        self.def.as_ref().map_or(0, |d| d.effect.precedence)
    }

    /// Apply the plugin's rewrite to a formula if it is active.
    pub fn modify_roll(&self, formula: &str) -> RollResult<String> {
        let active = self.is_active()?;
        Ok(match self.def.as_ref().and_then(|d| d.effect.rewrite.as_ref()) {
            Some(rewrite) if active => rewrite(formula),
            _ => formula.to_string(),
        })
    }

    pub(crate) fn bind(&mut self, def: Arc<PluginDef>, order: usize) {
        self.def = Some(def);
        self.order = order;
    }

    /// Derive the live state from the session.
    ///
    /// A failing predicate demotes the plugin to inactive and hidden; it never
    /// fails the roll. Hydration depends only on the session and the persisted
    /// data, so repeated calls yield the same state.
    pub fn hydrate(
        &mut self,
        session: &RollSession<'_>,
        scope: Scope,
        target: Option<&TargetHandle>,
    ) -> RollResult<PluginState> {
        let def = self
            .def
            .clone()
            .ok_or_else(|| RollError::UnknownPlugin(self.slug.clone()))?;
        let ctx = session.ctx(scope, target, &self.data);
        let computed = evaluate(&def, &ctx, &self.data);
        let mut state = match computed {
            Ok(state) => state,
            Err(reason) => {
                tracing::warn!(plugin = %self.slug, %scope, %reason, "plugin demoted");
                PluginState::default()
            }
        };
        if def.ui == UiBehavior::NoUi {
            state.visible = false;
        }
        tracing::debug!(plugin = %self.slug, %scope, active = state.active, "plugin hydrated");
        self.state = Some(state);
        Ok(state)
    }
}

fn evaluate(
    def: &PluginDef,
    ctx: &HydrateCtx<'_>,
    data: &PluginData,
) -> Result<PluginState, String> {
    match &def.activation {
        Activation::Talent {
            talent,
            rank,
            applies,
        } => {
            if ctx.actor.talent_rank(talent) < *rank {
                return Ok(PluginState::default());
            }
            let auto = ctx.config.automation_enabled && applies(ctx)?;
            Ok(PluginState {
                active: data.user_override.unwrap_or(auto),
                visible: true,
                reminder_active: false,
            })
        }
        Activation::Reminder { applies } => {
            let on = applies(ctx)?;
            Ok(PluginState {
                active: false,
                visible: on,
                reminder_active: on,
            })
        }
        Activation::AlwaysOn { applies } => {
            let on = applies(ctx)?;
            Ok(PluginState {
                active: data.user_override.unwrap_or(on),
                visible: on,
                reminder_active: false,
            })
        }
    }
}

/// Plugin instances attached to one container, keyed by slug.
///
/// Serializes as a map from slug to [`PluginData`]. Decoded maps are unbound
/// until [`PluginMap::bind`] links them to the registry.
#[derive(Debug, Clone, Default)]
pub struct PluginMap(BTreeMap<String, PluginInstance>);

impl PluginMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an instance, replacing any with the same slug.
    pub fn insert(&mut self, instance: PluginInstance) {
        self.0.insert(instance.slug.clone(), instance);
    }

    /// Look up an instance by slug.
    pub fn get(&self, slug: &str) -> Option<&PluginInstance> {
        self.0.get(slug)
    }

    /// Look up an instance by slug for editing.
    pub fn get_mut(&mut self, slug: &str) -> Option<&mut PluginInstance> {
        self.0.get_mut(slug)
    }

    /// All instances in slug order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginInstance> {
        self.0.values()
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Link decoded instances to their registered plugins.
    ///
    /// Fails with [`RollError::Validation`] if a slug is unknown, registered
    /// for another family or scope, or its fields violate the plugin's schema.
    pub fn bind(
        &mut self,
        registry: &PluginRegistry,
        family: Family,
        scope: Scope,
    ) -> RollResult<()> {
        for (slug, instance) in &mut self.0 {
            let (order, def) = registry
                .entry(slug)
                .ok_or_else(|| RollError::Validation(format!("unknown plugin '{slug}'")))?;
            if def.family != family || !def.has_scope(scope) {
                return Err(RollError::Validation(format!(
                    "plugin '{slug}' does not attach to {family} {scope} containers"
                )));
            }
            if let Some(schema) = registry.schema(slug) {
                schema.validate(&instance.data.fields).map_err(|reason| {
                    RollError::Validation(format!("plugin '{slug}': {reason}"))
                })?;
            }
            instance.bind(Arc::clone(def), order);
        }
        Ok(())
    }

    /// Hydrate every instance.
    pub fn hydrate(
        &mut self,
        session: &RollSession<'_>,
        scope: Scope,
        target: Option<&TargetHandle>,
    ) -> RollResult<()> {
        for instance in self.0.values_mut() {
            instance.hydrate(session, scope, target)?;
        }
        Ok(())
    }

    /// Sum of accuracy bonuses from active instances.
    pub fn acc_bonus(&self) -> RollResult<i32> {
        self.0.values().map(PluginInstance::acc_bonus).sum()
    }

    /// Whether every instance has been hydrated.
    pub fn is_hydrated(&self) -> bool {
        self.0.values().all(PluginInstance::is_hydrated)
    }
}

impl Serialize for PluginMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(slug, inst)| (slug, &inst.data)))
    }
}

impl<'de> Deserialize<'de> for PluginMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, PluginData>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .map(|(slug, data)| {
                    let inst = PluginInstance::unbound(slug.clone(), data);
                    (slug, inst)
                })
                .collect(),
        ))
    }
}

/// Apply every active rewrite from the given maps to a formula, in
/// descending precedence with ties broken by registration order.
pub(crate) fn compose<'a>(
    formula: String,
    maps: impl IntoIterator<Item = &'a PluginMap>,
) -> RollResult<String> {
    let mut instances: Vec<&PluginInstance> = maps.into_iter().flat_map(PluginMap::iter).collect();
    instances.sort_by_key(|i| (Reverse(i.precedence()), i.order));
    instances
        .into_iter()
        .try_fold(formula, |acc, inst| inst.modify_roll(&acc))
}
