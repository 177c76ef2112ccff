use serde::{Deserialize, Serialize};
use sk_core::item::{TAG_AP, TAG_OVERKILL, TAG_RELIABLE};
use sk_core::{Damage, DamageType, Tag, TargetHandle, TargetProvider, TokenId};
use sk_history::HitRecord;

use super::{decode, encode, resolve_target};
use crate::dice::Formula;
use crate::error::{RollError, RollResult};
use crate::plugin::{Family, PluginMap, PluginRegistry, RollSession, Scope, compose};

/// Weapon traits affecting damage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageWeaponContext {
    /// Damage dice showing 1 generate heat for the attacker.
    #[serde(default)]
    pub overkill: bool,
    /// Minimum damage dealt even on a miss.
    #[serde(default)]
    pub reliable: i32,
    /// Per-roll damage plugins.
    #[serde(default)]
    pub plugins: PluginMap,
    #[serde(skip)]
    hydrated: bool,
}

/// Damage dealt regardless of target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageBaseContext {
    /// Weapon damage.
    #[serde(default)]
    pub damage: Vec<Damage>,
    /// Extra damage from talents and effects.
    #[serde(default)]
    pub bonus_damage: Vec<Damage>,
    /// Armor piercing.
    #[serde(default)]
    pub ap: bool,
    /// Halve the final damage.
    #[serde(default)]
    pub half: bool,
    /// Per-unknown-target damage plugins.
    #[serde(default)]
    pub plugins: PluginMap,
    #[serde(skip)]
    hydrated: bool,
}

/// Damage against one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageTargetContext {
    /// The targeted token.
    pub token: TokenId,
    /// Whether the attack hit.
    #[serde(default)]
    pub hit: bool,
    /// Whether the attack was a critical hit.
    #[serde(default)]
    pub crit: bool,
    /// Per-target damage plugins.
    #[serde(default)]
    pub plugins: PluginMap,
    #[serde(skip)]
    live: Option<(TargetHandle, bool)>,
}

impl DamageTargetContext {
    /// The live target, once resolved.
    pub fn handle(&self) -> Option<&TargetHandle> {
        self.live.as_ref().map(|(h, _)| h)
    }

    fn is_hydrated(&self) -> bool {
        self.live.as_ref().is_some_and(|(_, h)| *h) && self.plugins.is_hydrated()
    }
}

/// Inputs for building a damage context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DamageParams {
    /// Title shown on the roll.
    pub title: String,
    /// Whether the damage comes from a weapon.
    pub weapon: bool,
    /// Tags of the weapon.
    pub tags: Vec<Tag>,
    /// Weapon damage.
    pub damage: Vec<Damage>,
    /// Extra damage.
    pub bonus_damage: Vec<Damage>,
    /// Outcomes of the preceding attack.
    pub hit_results: Vec<HitRecord>,
}

/// The formulas to roll against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageFormula {
    /// The target; `None` for untargeted damage.
    pub token: Option<TokenId>,
    /// Whether the attack hit.
    pub hit: bool,
    /// Whether the attack was a critical hit.
    pub crit: bool,
    /// One formula per damage entry.
    pub parts: Vec<(DamageType, String)>,
}

/// The full modifier state of a damage roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageRollContext {
    /// Title shown on the roll.
    pub title: String,
    /// Weapon traits; absent for non-weapon damage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<DamageWeaponContext>,
    /// Target-independent damage.
    pub base: DamageBaseContext,
    /// Outcomes of the preceding attack.
    #[serde(default)]
    pub hit_results: Vec<HitRecord>,
    /// One container per target.
    #[serde(default)]
    pub targets: Vec<DamageTargetContext>,
}

impl DamageRollContext {
    /// Build a damage context from an attack's outcomes.
    pub fn from_params(
        params: DamageParams,
        registry: &PluginRegistry,
        targets: &dyn TargetProvider,
    ) -> RollResult<Self> {
        let has = |id: &str| params.tags.iter().any(|t| t.is(id));
        let weapon = params.weapon.then(|| DamageWeaponContext {
            overkill: has(TAG_OVERKILL),
            reliable: params
                .tags
                .iter()
                .find(|t| t.is(TAG_RELIABLE))
                .and_then(|t| t.val)
                .unwrap_or(0),
            plugins: registry.instantiate(Family::Damage, Scope::PerRoll),
            hydrated: false,
        });
        let base = DamageBaseContext {
            damage: params.damage,
            bonus_damage: params.bonus_damage,
            ap: has(TAG_AP),
            half: false,
            plugins: registry.instantiate(Family::Damage, Scope::PerUnknownTarget),
            hydrated: false,
        };
        let target_contexts = params
            .hit_results
            .iter()
            .map(|hit| {
                let handle = resolve_target(targets, hit.token)?;
                Ok(DamageTargetContext {
                    token: hit.token,
                    hit: hit.hit,
                    crit: hit.crit,
                    plugins: registry.instantiate(Family::Damage, Scope::PerTarget),
                    live: Some((handle, false)),
                })
            })
            .collect::<RollResult<Vec<_>>>()?;

        let ctx = Self {
            title: params.title,
            weapon,
            base,
            hit_results: params.hit_results,
            targets: target_contexts,
        };
        Self::from_object(ctx.to_object()?, registry, targets)
    }

    /// Encode the persisted half.
    pub fn to_object(&self) -> RollResult<serde_json::Value> {
        encode(self)
    }

    /// Decode a persisted context, validating plugins and resolving targets.
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
        if let Some(weapon) = &mut self.weapon {
            weapon.plugins.bind(registry, Family::Damage, Scope::PerRoll)?;
        }
        self.base
            .plugins
            .bind(registry, Family::Damage, Scope::PerUnknownTarget)?;
        for target in &mut self.targets {
            target.plugins.bind(registry, Family::Damage, Scope::PerTarget)?;
            target.live = Some((resolve_target(targets, target.token)?, false));
        }
        Ok(())
    }

    /// Derive live state for every container.
    pub fn hydrate(&mut self, session: &RollSession<'_>) -> RollResult<()> {
        if let Some(weapon) = &mut self.weapon {
            weapon.plugins.hydrate(session, Scope::PerRoll, None)?;
            weapon.hydrated = true;
        }
        self.base
            .plugins
            .hydrate(session, Scope::PerUnknownTarget, None)?;
        self.base.hydrated = true;
        for target in &mut self.targets {
            let handle = match session.targets.target(target.token) {
                Some(h) => h,
                None => target
                    .handle()
                    .cloned()
                    .ok_or_else(|| RollError::NotHydrated(format!("target {}", target.token)))?,
            };
            target
                .plugins
                .hydrate(session, Scope::PerTarget, Some(&handle))?;
            target.live = Some((handle, true));
        }
        tracing::debug!(title = %self.title, targets = self.targets.len(), "damage context hydrated");
        Ok(())
    }

    /// Whether every container has been hydrated.
    pub fn is_hydrated(&self) -> bool {
        self.weapon
            .as_ref()
            .is_none_or(|w| w.hydrated && w.plugins.is_hydrated())
            && self.base.hydrated
            && self.base.plugins.is_hydrated()
            && self.targets.iter().all(DamageTargetContext::is_hydrated)
    }

    fn parts(&self, crit: bool, target: Option<&PluginMap>) -> RollResult<Vec<(DamageType, String)>> {
        let mut parts = Vec::new();
        for (i, damage) in self.base.damage.iter().chain(&self.base.bonus_damage).enumerate() {
            let mut formula: Formula = damage.val.parse()?;
            if crit {
                formula = formula.crit();
            }
            let mut text = formula.to_string();
            if i == 0 {
                let mut maps: Vec<&PluginMap> = Vec::with_capacity(3);
                if let Some(weapon) = &self.weapon {
                    maps.push(&weapon.plugins);
                }
                maps.push(&self.base.plugins);
                maps.extend(target);
                text = compose(text, maps)?;
            }
            parts.push((damage.kind, text));
        }
        Ok(parts)
    }

    /// Formulas to roll: one untargeted entry when there are no targets,
    /// otherwise one per target.
    ///
    /// Plugin rewrites apply to the first damage entry. Crits double each
    /// dice group and keep the highest. Misses roll nothing unless the weapon
    /// is reliable, in which case they deal the reliable value.
    pub fn formulas(&self) -> RollResult<Vec<DamageFormula>> {
        if !self.is_hydrated() {
            return Err(RollError::NotHydrated("damage formulas".into()));
        }
        if self.targets.is_empty() {
            return Ok(vec![DamageFormula {
                token: None,
                hit: true,
                crit: false,
                parts: self.parts(false, None)?,
            }]);
        }
        let reliable = self.weapon.as_ref().map_or(0, |w| w.reliable);
        self.targets
            .iter()
            .map(|target| {
                let parts = if target.hit {
                    self.parts(target.crit, Some(&target.plugins))?
                } else if reliable > 0 {
                    let kind = self
                        .base
                        .damage
                        .first()
                        .map_or(DamageType::Kinetic, |d| d.kind);
                    vec![(kind, reliable.to_string())]
                } else {
                    Vec::new()
                };
                Ok(DamageFormula {
                    token: Some(target.token),
                    hit: target.hit,
                    crit: target.crit,
                    parts,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginBuilder;
    use sk_core::{
        AutomationConfig, Condition, Encounter, Entity, EntityKind, EntityProvider,
    };
    use sk_history::ActionHistory;

    struct Fixture {
        enc: Encounter,
        attacker: Entity,
        prone: TokenId,
        standing: TokenId,
        history: ActionHistory,
        config: AutomationConfig,
    }

    fn fixture() -> Fixture {
        let enc = Encounter::new();
        let attacker = enc.add_entity(Entity::new(EntityKind::Mech, "Atlas"));
        enc.place(attacker, (0, 0)).unwrap();
        let mut down = Entity::new(EntityKind::Npc, "Down");
        down.conditions.insert(Condition::Prone);
        let down = enc.add_entity(down);
        let prone = enc.place(down, (1, 0)).unwrap();
        let up = enc.add_entity(Entity::new(EntityKind::Npc, "Up"));
        let standing = enc.place(up, (2, 0)).unwrap();
        Fixture {
            attacker: enc.entity(attacker).unwrap(),
            enc,
            prone,
            standing,
            history: ActionHistory::new(),
            config: AutomationConfig::default(),
        }
    }

    fn hit(token: TokenId, hit: bool, crit: bool) -> HitRecord {
        HitRecord { token, hit, crit }
    }

    fn params(fx: &Fixture, tags: Vec<Tag>) -> DamageParams {
        DamageParams {
            title: "Damage".into(),
            weapon: true,
            tags,
            damage: vec![Damage::new(DamageType::Kinetic, "1d6+2")],
            bonus_damage: vec![Damage::new(DamageType::Burn, "2")],
            hit_results: vec![
                hit(fx.prone, true, true),
                hit(fx.standing, false, false),
            ],
        }
    }

    fn build(fx: &Fixture, registry: &PluginRegistry, tags: Vec<Tag>) -> DamageRollContext {
        let mut ctx = DamageRollContext::from_params(params(fx, tags), registry, &fx.enc).unwrap();
        let session = RollSession::new(&fx.attacker, &fx.history, &fx.config, &fx.enc);
        ctx.hydrate(&session).unwrap();
        ctx
    }

    #[test]
    fn crit_doubles_and_miss_rolls_nothing() {
        let fx = fixture();
        let ctx = build(&fx, &PluginRegistry::new(), vec![]);
        let formulas = ctx.formulas().unwrap();
        assert_eq!(
            formulas[0].parts,
            vec![
                (DamageType::Kinetic, "2d6kh1 + 2".to_string()),
                (DamageType::Burn, "2".to_string())
            ]
        );
        assert!(formulas[1].parts.is_empty());
    }

    #[test]
    fn reliable_damage_on_miss() {
        let fx = fixture();
        let ctx = build(
            &fx,
            &PluginRegistry::new(),
            vec![Tag::with_val(TAG_RELIABLE, 3), Tag::new(TAG_AP)],
        );
        assert!(ctx.base.ap);
        assert_eq!(ctx.weapon.as_ref().unwrap().reliable, 3);
        let formulas = ctx.formulas().unwrap();
        assert_eq!(formulas[1].parts, vec![(DamageType::Kinetic, "3".to_string())]);
    }

    #[test]
    fn per_target_damage_plugin_rewrites_first_entry() {
        let fx = fixture();
        let mut registry = PluginRegistry::new();
        registry.register(
            PluginBuilder::new("bonus", "Bonus")
                .family(Family::Damage)
                .scope(Scope::PerTarget)
                .always_on(|ctx| Ok(ctx.target_has(Condition::Prone)))
                .rewrite(0, |f| format!("{f} + 1d6"))
                .build()
                .unwrap(),
        );
        let mut ctx = build(&fx, &registry, vec![]);
        ctx.targets[1].hit = true;
        let formulas = ctx.formulas().unwrap();
        assert_eq!(formulas[0].parts[0].1, "2d6kh1 + 2 + 1d6");
        assert_eq!(formulas[0].parts[1].1, "2");
        assert_eq!(formulas[1].parts[0].1, "1d6 + 2");
    }

    #[test]
    fn untargeted_damage() {
        let fx = fixture();
        let mut p = params(&fx, vec![]);
        p.hit_results.clear();
        let mut ctx = DamageRollContext::from_params(p, &PluginRegistry::new(), &fx.enc).unwrap();
        assert!(ctx.formulas().is_err());
        let session = RollSession::new(&fx.attacker, &fx.history, &fx.config, &fx.enc);
        ctx.hydrate(&session).unwrap();
        let formulas = ctx.formulas().unwrap();
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].token, None);
        assert_eq!(formulas[0].parts[0].1, "1d6 + 2");
    }

    #[test]
    fn round_trip() {
        let fx = fixture();
        let registry = crate::plugins::default_registry();
        let ctx = build(&fx, &registry, vec![Tag::new(TAG_OVERKILL)]);
        let obj = ctx.to_object().unwrap();
        let back = DamageRollContext::from_object(obj.clone(), &registry, &fx.enc).unwrap();
        assert_eq!(back.to_object().unwrap(), obj);
        assert!(back.weapon.unwrap().overkill);
    }
}
