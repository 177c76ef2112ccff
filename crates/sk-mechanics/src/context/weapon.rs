use serde::{Deserialize, Serialize};
use sk_core::item::{TAG_ACCURATE, TAG_INACCURATE, TAG_SEEKING};
use sk_core::{Condition, Cover, Entity, Tag};

use crate::error::{RollError, RollResult};
use crate::plugin::{PluginMap, RollSession, Scope};

/// Target-independent traits of the attack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeaponContext {
    /// +1 accuracy.
    #[serde(default)]
    pub accurate: bool,
    /// +1 difficulty.
    #[serde(default)]
    pub inaccurate: bool,
    /// Cover is ignored.
    #[serde(default)]
    pub seeking: bool,
    /// +1 difficulty from the actor being impaired.
    #[serde(default)]
    pub impaired: bool,
    /// +1 difficulty from the actor being engaged.
    #[serde(default)]
    pub engaged: bool,
    /// Per-roll plugins.
    #[serde(default)]
    pub plugins: PluginMap,
    #[serde(skip)]
    hydrated: bool,
}

impl WeaponContext {
    /// Derive traits from item tags and the actor's conditions. Unknown tags are ignored.
    pub fn from_tags(tags: &[Tag], actor: &Entity, plugins: PluginMap) -> Self {
        let has = |id: &str| tags.iter().any(|t| t.is(id));
        Self {
            accurate: has(TAG_ACCURATE),
            inaccurate: has(TAG_INACCURATE),
            seeking: has(TAG_SEEKING),
            impaired: actor.has_condition(Condition::Impaired),
            engaged: actor.has_condition(Condition::Engaged),
            plugins,
            hydrated: false,
        }
    }

    /// Whether hydration has run.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated && self.plugins.is_hydrated()
    }

    pub(crate) fn hydrate(&mut self, session: &RollSession<'_>) -> RollResult<()> {
        self.plugins.hydrate(session, Scope::PerRoll, None)?;
        self.hydrated = true;
        Ok(())
    }

    /// Net accuracy from weapon traits against the given cover.
    pub fn total(&self, cover: Cover) -> RollResult<i32> {
        if !self.hydrated {
            return Err(RollError::NotHydrated("weapon total".into()));
        }
        let cover = if self.seeking { 0 } else { cover.penalty() };
        Ok(i32::from(self.accurate) - i32::from(self.inaccurate) - cover
            - i32::from(self.impaired)
            - i32::from(self.engaged)
            + self.plugins.acc_bonus()?)
    }
}
