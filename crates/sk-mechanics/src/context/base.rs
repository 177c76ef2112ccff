use serde::{Deserialize, Serialize};
use sk_core::Cover;

use crate::error::{RollError, RollResult};
use crate::plugin::{PluginMap, RollSession, Scope};

/// Modifiers that apply with no resolved target, or regardless of target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseContext {
    /// Flat bonus added to the d20.
    #[serde(default)]
    pub grit: i32,
    /// User-chosen accuracy.
    #[serde(default)]
    pub accuracy: i32,
    /// User-chosen difficulty.
    #[serde(default)]
    pub difficulty: i32,
    /// Cover chosen by the user; seeds targets whose token reports none.
    #[serde(default)]
    pub cover: Cover,
    /// Per-unknown-target plugins.
    #[serde(default)]
    pub plugins: PluginMap,
    #[serde(skip)]
    hydrated: bool,
}

impl BaseContext {
    /// Base modifiers with the given plugins.
    pub fn new(grit: i32, accuracy: i32, difficulty: i32, cover: Cover, plugins: PluginMap) -> Self {
        Self {
            grit,
            accuracy,
            difficulty,
            cover,
            plugins,
            hydrated: false,
        }
    }

    /// Whether hydration has run.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated && self.plugins.is_hydrated()
    }

    pub(crate) fn hydrate(&mut self, session: &RollSession<'_>) -> RollResult<()> {
        self.plugins.hydrate(session, Scope::PerUnknownTarget, None)?;
        self.hydrated = true;
        Ok(())
    }

    /// `accuracy - difficulty` plus plugin bonuses.
    pub fn total(&self) -> RollResult<i32> {
        if !self.hydrated {
            return Err(RollError::NotHydrated("base total".into()));
        }
        Ok(self.accuracy - self.difficulty + self.plugins.acc_bonus()?)
    }
}
