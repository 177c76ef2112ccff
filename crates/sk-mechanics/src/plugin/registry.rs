use std::collections::HashMap;
use std::sync::Arc;

use super::def::{Family, PluginDef, PluginSchema, Scope};
use super::instance::{PluginInstance, PluginMap};

/// The set of plugins every roll context is built from.
///
/// Registration order is significant: it breaks ties between plugins that
/// rewrite formulas at the same precedence.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<PluginDef>>,
    index: HashMap<String, usize>,
    targeted: Vec<usize>,
    schemas: HashMap<String, PluginSchema>,
    multi_scoped: Vec<String>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Returns `false` if the slug was already registered,
    /// in which case the registry is left unchanged.
    pub fn register(&mut self, def: PluginDef) -> bool {
        if self.index.contains_key(&def.slug) {
            tracing::debug!(plugin = %def.slug, "plugin already registered");
            return false;
        }
        if def.is_multi_scoped() {
            tracing::warn!(
                plugin = %def.slug,
                "plugin is both per-roll and per-target; its bonus may apply twice"
            );
            self.multi_scoped.push(def.slug.clone());
        }

        let idx = self.plugins.len();
        self.index.insert(def.slug.clone(), idx);
        self.schemas.insert(def.slug.clone(), def.schema.clone());
        if def.has_scope(Scope::PerTarget) {
            self.targeted.push(idx);
        }
        tracing::debug!(plugin = %def.slug, family = %def.family, "plugin registered");
        self.plugins.push(Arc::new(def));
        true
    }

    /// Look up a plugin and its registration index.
    pub fn entry(&self, slug: &str) -> Option<(usize, &Arc<PluginDef>)> {
        let idx = *self.index.get(slug)?;
        self.plugins.get(idx).map(|def| (idx, def))
    }

    /// Look up a plugin by slug.
    pub fn get(&self, slug: &str) -> Option<&Arc<PluginDef>> {
        self.entry(slug).map(|(_, def)| def)
    }

    /// The schema registered for a slug.
    pub fn schema(&self, slug: &str) -> Option<&PluginSchema> {
        self.schemas.get(slug)
    }

    /// All plugins in registration order.
    pub fn plugins(&self) -> &[Arc<PluginDef>] {
        &self.plugins
    }

    /// Plugins exposing a per-target scope, in registration order.
    pub fn targeted(&self) -> impl Iterator<Item = &Arc<PluginDef>> {
        self.targeted.iter().filter_map(|&i| self.plugins.get(i))
    }

    /// Slugs of plugins registered with both a per-roll and a target-level scope.
    pub fn multi_scoped(&self) -> &[String] {
        &self.multi_scoped
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Construct one fresh instance of every plugin for a container.
    ///
    /// Per-target containers draw from the targeted list only.
    pub fn instantiate(&self, family: Family, scope: Scope) -> PluginMap {
        let candidates: Vec<usize> = match scope {
            Scope::PerTarget => self.targeted.clone(),
            Scope::PerRoll | Scope::PerUnknownTarget => (0..self.plugins.len()).collect(),
        };
        let mut map = PluginMap::new();
        for idx in candidates {
            let Some(def) = self.plugins.get(idx) else {
                continue;
            };
            if def.family == family && def.has_scope(scope) {
                map.insert(PluginInstance::new(Arc::clone(def), idx));
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginBuilder;

    fn plugin(slug: &str, scope: Scope) -> PluginDef {
        PluginBuilder::new(slug, slug)
            .scope(scope)
            .always_on(|_| Ok(true))
            .accuracy(1)
            .build()
            .unwrap()
    }

    #[test]
    fn register_is_idempotent_by_slug() {
        let mut reg = PluginRegistry::new();
        assert!(reg.register(plugin("a", Scope::PerRoll)));
        assert!(!reg.register(plugin("a", Scope::PerTarget)));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("a").unwrap().has_scope(Scope::PerRoll));
        assert_eq!(reg.targeted().count(), 0);
    }

    #[test]
    fn targeted_list_and_schemas() {
        let mut reg = PluginRegistry::new();
        reg.register(plugin("roll", Scope::PerRoll));
        reg.register(plugin("target", Scope::PerTarget));
        reg.register(plugin("base", Scope::PerUnknownTarget));

        let targeted: Vec<_> = reg.targeted().map(|d| d.slug.as_str()).collect();
        assert_eq!(targeted, vec!["target"]);
        assert!(reg.schema("base").is_some());
        assert!(reg.schema("missing").is_none());
        assert_eq!(reg.entry("base").map(|(i, _)| i), Some(2));
    }

    #[test]
    fn multi_scoped_plugins_are_listed() {
        let mut reg = PluginRegistry::new();
        let both = PluginBuilder::new("both", "Both")
            .scope(Scope::PerRoll)
            .scope(Scope::PerUnknownTarget)
            .always_on(|_| Ok(true))
            .build()
            .unwrap();
        assert!(reg.register(both));
        reg.register(plugin("single", Scope::PerRoll));
        assert_eq!(reg.multi_scoped(), ["both".to_string()]);
    }

    #[test]
    fn instantiate_filters_by_family_and_scope() {
        let mut reg = PluginRegistry::new();
        reg.register(plugin("roll", Scope::PerRoll));
        reg.register(plugin("target", Scope::PerTarget));
        let damage = PluginBuilder::new("dmg", "Damage")
            .family(Family::Damage)
            .scope(Scope::PerRoll)
            .always_on(|_| Ok(true))
            .build()
            .unwrap();
        reg.register(damage);

        let map = reg.instantiate(Family::Attack, Scope::PerRoll);
        assert_eq!(map.len(), 1);
        assert!(map.get("roll").is_some());
        assert!(!map.get("roll").unwrap().is_hydrated());

        let map = reg.instantiate(Family::Damage, Scope::PerRoll);
        assert!(map.get("dmg").is_some());
    }

    #[test]
    fn per_target_instances_come_from_the_targeted_list() {
        let mut reg = PluginRegistry::new();
        reg.register(plugin("roll", Scope::PerRoll));
        reg.register(plugin("near", Scope::PerTarget));
        reg.register(plugin("base", Scope::PerUnknownTarget));
        reg.register(plugin("far", Scope::PerTarget));

        let map = reg.instantiate(Family::Attack, Scope::PerTarget);
        let slugs: Vec<_> = map.iter().map(PluginInstance::slug).collect();
        assert_eq!(slugs, vec!["far", "near"]);
        assert!(map.get("far").is_some_and(|p| p.def().is_some()));
        assert!(map.get("roll").is_none());
        assert!(map.get("base").is_none());
    }
}
