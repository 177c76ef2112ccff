use serde::{Deserialize, Serialize};
use sk_core::{Condition, Cover, TargetHandle, TargetProvider, TokenId};

use super::resolve_target;
use super::weapon::WeaponContext;
use crate::error::{RollError, RollResult};
use crate::plugin::{PluginMap, RollSession, Scope};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
struct LiveTarget {
    handle: TargetHandle,
    prone: bool,
    lock_on: bool,
    hydrated: bool,
}

/// Modifiers against one targeted token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetContext {
    /// The targeted token.
    pub token: TokenId,
    /// User-chosen accuracy against this target.
    #[serde(default)]
    pub accuracy: i32,
    /// User-chosen difficulty against this target.
    #[serde(default)]
    pub difficulty: i32,
    /// Cover this target benefits from.
    #[serde(default)]
    pub cover: Cover,
    /// Spend the target's Lock On for +1 accuracy.
    #[serde(default = "default_true")]
    pub consume_lock_on: bool,
    /// Per-target plugins.
    #[serde(default)]
    pub plugins: PluginMap,
    #[serde(skip)]
    live: Option<LiveTarget>,
}

impl TargetContext {
    /// A fresh container bound to a live target.
    pub fn new(handle: TargetHandle, cover: Cover, plugins: PluginMap) -> Self {
        Self {
            token: handle.token,
            accuracy: 0,
            difficulty: 0,
            cover,
            consume_lock_on: true,
            plugins,
            live: Some(LiveTarget {
                handle,
                prone: false,
                lock_on: false,
                hydrated: false,
            }),
        }
    }

    /// The live target, once resolved.
    pub fn handle(&self) -> Option<&TargetHandle> {
        self.live.as_ref().map(|l| &l.handle)
    }

    /// Resolve the persisted token to a live target on the active scene.
    pub(crate) fn resolve(&mut self, targets: &dyn TargetProvider) -> RollResult<()> {
        let handle = resolve_target(targets, self.token)?;
        self.live = Some(LiveTarget {
            handle,
            prone: false,
            lock_on: false,
            hydrated: false,
        });
        Ok(())
    }

    pub(crate) fn hydrate(&mut self, session: &RollSession<'_>) -> RollResult<()> {
        let handle = match session.targets.target(self.token) {
            Some(h) => h,
            None => self
                .handle()
                .cloned()
                .ok_or_else(|| RollError::NotHydrated(format!("target {}", self.token)))?,
        };
        self.plugins
            .hydrate(session, Scope::PerTarget, Some(&handle))?;
        self.live = Some(LiveTarget {
            prone: handle.has_condition(Condition::Prone),
            lock_on: handle.has_condition(Condition::LockOn),
            handle,
            hydrated: true,
        });
        Ok(())
    }

    fn live(&self) -> RollResult<&LiveTarget> {
        self.live
            .as_ref()
            .filter(|l| l.hydrated && self.plugins.is_hydrated())
            .ok_or_else(|| RollError::NotHydrated(format!("target {}", self.token)))
    }

    /// Whether hydration has run since the container was built or decoded.
    pub fn is_hydrated(&self) -> bool {
        self.live().is_ok()
    }

    /// Whether the target is prone (+1 accuracy).
    pub fn prone(&self) -> RollResult<bool> {
        Ok(self.live()?.prone)
    }

    /// Whether Lock On is being consumed: requested and present on the target.
    pub fn using_lock_on(&self) -> RollResult<bool> {
        Ok(self.consume_lock_on && self.live()?.lock_on)
    }

    /// The per-target total, given the base total and the weapon container.
    pub fn total(&self, base_total: i32, weapon: &WeaponContext) -> RollResult<i32> {
        Ok(base_total
            + weapon.total(self.cover)?
            + i32::from(self.using_lock_on()?)
            + i32::from(self.prone()?)
            + self.plugins.acc_bonus()?
            + self.accuracy
            - self.difficulty)
    }
}
