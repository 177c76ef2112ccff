use serde::{Deserialize, Serialize};
use sk_core::{Cover, Entity, Tag, TargetProvider, TokenId};

use super::base::BaseContext;
use super::target::TargetContext;
use super::weapon::WeaponContext;
use super::{RollTotal, decode, encode, resolve_target, seed_cover};
use crate::dice::accuracy_formula;
use crate::error::RollResult;
use crate::plugin::{Family, PluginRegistry, RollSession, Scope, compose};

/// Inputs for building an attack context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttackParams {
    /// Title shown on the roll.
    pub title: String,
    /// Tags of the item (or action) being used.
    pub tags: Vec<Tag>,
    /// Targeted tokens.
    pub targets: Vec<TokenId>,
    /// Flat bonus added to the d20.
    pub grit: i32,
    /// Starting accuracy.
    pub accuracy: i32,
    /// Starting difficulty.
    pub difficulty: i32,
    /// Chosen cover; `None` when absent.
    pub cover: Option<Cover>,
}

/// The full modifier state of an attack roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttackRollContext {
    /// Title shown on the roll.
    pub title: String,
    /// Target-independent traits.
    pub weapon: WeaponContext,
    /// Modifiers independent of any target.
    pub base: BaseContext,
    /// One container per target.
    #[serde(default)]
    pub targets: Vec<TargetContext>,
}

impl AttackRollContext {
    /// Build a context from inputs, attaching one instance of every matching
    /// plugin to each container, then encode and decode it once so it leaves
    /// in exactly the shape a persisted context would come back in.
    pub fn from_params(
        params: AttackParams,
        actor: &Entity,
        registry: &PluginRegistry,
        targets: &dyn TargetProvider,
    ) -> RollResult<Self> {
        let cover = params.cover.unwrap_or_default();
        let weapon = WeaponContext::from_tags(
            &params.tags,
            actor,
            registry.instantiate(Family::Attack, Scope::PerRoll),
        );
        let base = BaseContext::new(
            params.grit,
            params.accuracy,
            params.difficulty,
            cover,
            registry.instantiate(Family::Attack, Scope::PerUnknownTarget),
        );
        let target_contexts = params
            .targets
            .iter()
            .map(|&token| {
                let handle = resolve_target(targets, token)?;
                let cover = seed_cover(&handle, cover);
                Ok(TargetContext::new(
                    handle,
                    cover,
                    registry.instantiate(Family::Attack, Scope::PerTarget),
                ))
            })
            .collect::<RollResult<Vec<_>>>()?;

        let ctx = Self {
            title: params.title,
            weapon,
            base,
            targets: target_contexts,
        };
        Self::from_object(ctx.to_object()?, registry, targets)
    }

    /// Encode the persisted half.
    pub fn to_object(&self) -> RollResult<serde_json::Value> {
        encode(self)
    }

    /// Decode a persisted context, validate its plugins against the registry,
    /// and resolve its targets on the active scene.
    pub fn from_object(
        value: serde_json::Value,
        registry: &PluginRegistry,
        targets: &dyn TargetProvider,
    ) -> RollResult<Self> {
        let mut ctx: Self = decode(value)?;
        ctx.bind(registry, targets)?;
        Ok(ctx)
    }

    /// Link decoded plugins to the registry and resolve targets.
    pub fn bind(&mut self, registry: &PluginRegistry, targets: &dyn TargetProvider) -> RollResult<()> {
        self.weapon
            .plugins
            .bind(registry, Family::Attack, Scope::PerRoll)?;
        self.base
            .plugins
            .bind(registry, Family::Attack, Scope::PerUnknownTarget)?;
        for target in &mut self.targets {
            target.plugins.bind(registry, Family::Attack, Scope::PerTarget)?;
            target.resolve(targets)?;
        }
        Ok(())
    }

    /// Derive live state for every container.
    pub fn hydrate(&mut self, session: &RollSession<'_>) -> RollResult<()> {
        self.weapon.hydrate(session)?;
        self.base.hydrate(session)?;
        for target in &mut self.targets {
            target.hydrate(session)?;
        }
        tracing::debug!(title = %self.title, targets = self.targets.len(), "attack context hydrated");
        Ok(())
    }

    /// Whether every container has been hydrated.
    pub fn is_hydrated(&self) -> bool {
        self.weapon.is_hydrated()
            && self.base.is_hydrated()
            && self.targets.iter().all(TargetContext::is_hydrated)
    }

    /// Totals and formulas: one untargeted entry when there are no targets,
    /// otherwise one per target in order.
    pub fn totals(&self) -> RollResult<Vec<RollTotal>> {
        let base = self.base.total()?;
        if self.targets.is_empty() {
            let total = base + self.weapon.total(Cover::None)?;
            let formula = compose(
                accuracy_formula(self.base.grit, total),
                [&self.weapon.plugins, &self.base.plugins],
            )?;
            return Ok(vec![RollTotal {
                token: None,
                total,
                formula,
            }]);
        }
        self.targets
            .iter()
            .map(|target| {
                let total = target.total(base, &self.weapon)?;
                let formula = compose(
                    accuracy_formula(self.base.grit, total),
                    [&self.weapon.plugins, &self.base.plugins, &target.plugins],
                )?;
                Ok(RollTotal {
                    token: Some(target.token),
                    total,
                    formula,
                })
            })
            .collect()
    }

    /// Retarget the roll.
    ///
    /// Containers for tokens still targeted keep their user edits; new tokens
    /// get fresh containers; dropped tokens are discarded. Everything is
    /// re-hydrated afterwards.
    pub fn replace_targets(
        &mut self,
        tokens: &[TokenId],
        registry: &PluginRegistry,
        session: &RollSession<'_>,
    ) -> RollResult<()> {
        let mut next = Vec::with_capacity(tokens.len());
        for &token in tokens {
            match self.targets.iter().find(|t| t.token == token) {
                Some(existing) => next.push(existing.clone()),
                None => {
                    let handle = resolve_target(session.targets, token)?;
                    let cover = seed_cover(&handle, self.base.cover);
                    next.push(TargetContext::new(
                        handle,
                        cover,
                        registry.instantiate(Family::Attack, Scope::PerTarget),
                    ));
                }
            }
        }
        self.targets = next;
        self.hydrate(session)
    }
}
