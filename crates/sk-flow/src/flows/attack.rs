//! Weapon, basic, and tech attacks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sk_core::item::TAG_SEEKING;
use sk_core::{Cover, Tag, TokenId};
use sk_history::{ActionKind, ActionRecord, HitRecord};
use sk_mechanics::{AttackParams, AttackRollContext, Roll, RollError};

use super::damage::{DamageFlow, DamagePayload};
use crate::chat::Template;
use crate::error::FlowResult;
use crate::flow::{FlowKind, SerializedFlow};
use crate::hud::{HudAnswer, HudError};
use crate::services::FlowServices;
use crate::state::FlowState;
use crate::step::{Step, StepRef, StepSequence};
use crate::steps::{
    CHECK_ITEM, CONSUME, CheckItem, ConsumeItem, ItemRequirement, RECORD, RENDER, Render,
    RenderMessage, SELF_HEAT, SelfHeat, precondition_failed, record_action, with_session,
};

/// Key of the target selection step.
pub const SELECT_TARGETS: &str = "select_targets";
/// Key of the context building step.
pub const INIT: &str = "init";
/// Key of the modifier prompt step.
pub const SHOW_HUD: &str = "show_hud";
/// Key of the dice step.
pub const ROLL: &str = "roll";

/// A natural-or-modified result at or above this is a critical hit.
pub const CRIT_THRESHOLD: i32 = 20;

/// Which attack is being made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    /// An attack with a weapon item.
    #[default]
    Weapon,
    /// An improvised attack without an item.
    Basic,
    /// A tech attack against electronic defense.
    Tech,
}

/// The outcome against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackResult {
    /// The target; `None` for an untargeted roll.
    pub token: Option<TokenId>,
    /// Target display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// The evaluated roll.
    pub roll: Roll,
    /// The defense rolled against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<i32>,
    /// Whether the attack hit.
    pub hit: bool,
    /// Whether the attack was a critical hit.
    pub crit: bool,
}

/// State shared by every attack flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackPayload {
    /// Which attack.
    pub mode: AttackMode,
    /// Roll title; defaults to the item name.
    pub title: String,
    /// Targets; defaults to the user's current targets.
    pub targets: Vec<TokenId>,
    /// Extra accuracy.
    pub accuracy: i32,
    /// Extra difficulty.
    pub difficulty: i32,
    /// Cover chosen for untargeted rolls and seeded into new targets.
    pub cover: Option<Cover>,
    /// The roll context, once built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<AttackRollContext>,
    /// Per-target outcomes, once rolled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<AttackResult>,
}

impl AttackPayload {
    /// A payload for the given mode and targets.
    pub fn new(mode: AttackMode, targets: Vec<TokenId>) -> Self {
        Self {
            mode,
            targets,
            ..Self::default()
        }
    }

    /// Hit records for the history and damage rolls.
    pub fn hit_records(&self) -> Vec<HitRecord> {
        self.results
            .iter()
            .filter_map(|r| {
                r.token.map(|token| HitRecord {
                    token,
                    hit: r.hit,
                    crit: r.crit,
                })
            })
            .collect()
    }
}

impl Render for AttackPayload {
    fn template(&self) -> Template {
        match self.mode {
            AttackMode::Tech => Template::TechAttack,
            AttackMode::Weapon | AttackMode::Basic => Template::Attack,
        }
    }

    fn follow_up(state: &FlowState<Self>) -> FlowResult<Option<SerializedFlow>> {
        let Some(item) = &state.item else {
            return Ok(None);
        };
        let Some(profile) = item.weapon_profile() else {
            return Ok(None);
        };
        let hits = state.payload.hit_records();
        if state.payload.mode != AttackMode::Weapon || !hits.iter().any(|h| h.hit) {
            return Ok(None);
        }
        let payload = DamagePayload {
            title: format!("{} damage", state.payload.title),
            damage: profile.damage.clone(),
            tags: item.tags.clone(),
            hit_results: hits,
            ..DamagePayload::default()
        };
        let follow = FlowState {
            name: DamageFlow::NAME.to_string(),
            source: state.source.clone(),
            actor: state.actor.clone(),
            item: state.item.clone(),
            payload,
        };
        follow.snapshot().map(Some)
    }
}

/// Fills targets from the user's selection, prompting when configured.
#[derive(Debug, Clone, Copy)]
pub struct SelectTargets;

#[async_trait]
impl Step<AttackPayload> for SelectTargets {
    async fn run(
        &self,
        state: &mut FlowState<AttackPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        if !state.payload.targets.is_empty() || state.payload.context.is_some() {
            return Ok(true);
        }
        let candidates = services.targets.user_targets();
        if !services.config.prompt_modifiers {
            state.payload.targets = candidates;
            return Ok(true);
        }
        match services.hud.pick_targets(candidates).await {
            Ok(tokens) => {
                state.payload.targets = tokens;
                Ok(true)
            }
            Err(HudError::Cancelled) => Ok(false),
            Err(e) => Ok(precondition_failed(state, services, &e.to_string())),
        }
    }
}

/// Builds or re-binds the roll context and hydrates it.
#[derive(Debug, Clone, Copy)]
pub struct InitAttack(pub AttackMode);

fn hydrate_context(
    state: &FlowState<AttackPayload>,
    services: &FlowServices,
    ctx: &mut AttackRollContext,
) -> FlowResult<()> {
    with_session(state, services, |session| ctx.hydrate(session))?;
    Ok(())
}

#[async_trait]
impl Step<AttackPayload> for InitAttack {
    async fn run(
        &self,
        state: &mut FlowState<AttackPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let mode = self.0;
        state.payload.mode = mode;
        if state.payload.title.is_empty() {
            state.payload.title = match (&state.item, mode) {
                (_, AttackMode::Tech) => "Tech Attack".to_string(),
                (Some(item), AttackMode::Weapon) => item.name.clone(),
                _ => "Basic Attack".to_string(),
            };
        }
        if mode != AttackMode::Basic
            && state.payload.targets.is_empty()
            && state.payload.context.is_none()
        {
            state.payload.targets = services.targets.user_targets();
        }

        let mut ctx = match state.payload.context.take() {
            Some(mut ctx) => {
                ctx.bind(&services.plugins, services.targets.as_ref())?;
                ctx
            }
            None => {
                let mut tags = match mode {
                    AttackMode::Weapon => state.item.as_ref().map(|i| i.tags.clone()).unwrap_or_default(),
                    AttackMode::Basic | AttackMode::Tech => Vec::new(),
                };
                if mode == AttackMode::Tech {
                    tags.push(Tag::new(TAG_SEEKING));
                }
                let grit = match mode {
                    AttackMode::Tech => state.actor.tech_attack,
                    AttackMode::Weapon | AttackMode::Basic => state.actor.grit,
                };
                let params = AttackParams {
                    title: state.payload.title.clone(),
                    tags,
                    targets: state.payload.targets.clone(),
                    grit,
                    accuracy: state.payload.accuracy,
                    difficulty: state.payload.difficulty,
                    cover: state.payload.cover,
                };
                AttackRollContext::from_params(
                    params,
                    &state.actor,
                    &services.plugins,
                    services.targets.as_ref(),
                )?
            }
        };
        hydrate_context(state, services, &mut ctx)?;
        state.payload.targets = ctx.targets.iter().map(|t| t.token).collect();
        state.payload.context = Some(ctx);
        Ok(true)
    }
}

/// Lets the user edit modifiers before rolling. A retarget answer moves the
/// open roll onto new targets and asks again.
#[derive(Debug, Clone, Copy)]
pub struct ShowHud;

#[async_trait]
impl Step<AttackPayload> for ShowHud {
    async fn run(
        &self,
        state: &mut FlowState<AttackPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        if !services.config.prompt_modifiers {
            return Ok(true);
        }
        let Some(mut ctx) = state.payload.context.clone() else {
            return Ok(true);
        };
        let title = state.payload.title.clone();
        loop {
            let object = ctx.to_object()?;
            match services.hud.edit_context(title.clone(), object).await {
                Ok(HudAnswer::Context(edited)) => {
                    ctx = AttackRollContext::from_object(
                        edited,
                        &services.plugins,
                        services.targets.as_ref(),
                    )?;
                    hydrate_context(state, services, &mut ctx)?;
                    break;
                }
                Ok(HudAnswer::Retarget { context, targets }) => {
                    ctx = AttackRollContext::from_object(
                        context,
                        &services.plugins,
                        services.targets.as_ref(),
                    )?;
                    with_session(state, services, |session| {
                        ctx.replace_targets(&targets, &services.plugins, session)
                    })?;
                    tracing::debug!(flow = %state.name, targets = targets.len(), "attack retargeted");
                }
                Ok(HudAnswer::Targets(_)) => {
                    return Ok(precondition_failed(state, services, &HudError::Mismatch.to_string()));
                }
                Err(HudError::Cancelled) => {
                    tracing::debug!(flow = %state.name, "attack cancelled");
                    return Ok(false);
                }
                Err(e) => return Ok(precondition_failed(state, services, &e.to_string())),
            }
        }
        state.payload.targets = ctx.targets.iter().map(|t| t.token).collect();
        state.payload.context = Some(ctx);
        Ok(true)
    }
}

/// Rolls every total against its target's defense.
#[derive(Debug, Clone, Copy)]
pub struct RollAttack;

#[async_trait]
impl Step<AttackPayload> for RollAttack {
    async fn run(
        &self,
        state: &mut FlowState<AttackPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let ctx = state
            .payload
            .context
            .as_ref()
            .ok_or_else(|| RollError::NotHydrated("attack context".into()))?;
        let tech = state.payload.mode == AttackMode::Tech;
        let mut results = Vec::new();
        for total in ctx.totals()? {
            let roll = services.evaluator.evaluate(&total.formula)?;
            let handle = total.token.and_then(|t| services.targets.target(t));
            let defense = handle.as_ref().map(|h| {
                if tech {
                    h.entity.defenses.e_defense
                } else {
                    h.entity.defenses.evasion
                }
            });
            let hit = defense.is_none_or(|d| roll.total >= d);
            let crit = !tech && hit && roll.total >= CRIT_THRESHOLD;
            tracing::debug!(formula = %total.formula, total = roll.total, hit, crit, "attack rolled");
            results.push(AttackResult {
                token: total.token,
                target: handle.map(|h| h.name().to_string()),
                roll,
                defense,
                hit,
                crit,
            });
        }
        state.payload.results = results;
        Ok(true)
    }
}

/// Appends the attack to the history.
#[derive(Debug, Clone, Copy)]
pub struct RecordAttack;

#[async_trait]
impl Step<AttackPayload> for RecordAttack {
    async fn run(
        &self,
        state: &mut FlowState<AttackPayload>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        let kind = match state.payload.mode {
            AttackMode::Tech => ActionKind::TechAttack,
            AttackMode::Weapon | AttackMode::Basic => ActionKind::Attack,
        };
        let mut action = ActionRecord::new(kind).with_hits(state.payload.hit_records());
        if let Some(item) = &state.item {
            action = action.with_item(item);
        }
        if let Some(ctx) = &state.payload.context {
            action = action.with_snapshot(ctx.to_object()?);
        }
        record_action(state, services, action);
        Ok(true)
    }
}

fn attack_steps(mode: AttackMode) -> StepSequence<AttackPayload> {
    let seq = StepSequence::new();
    let seq = match mode {
        AttackMode::Weapon => seq.with(CHECK_ITEM, StepRef::step(CheckItem(ItemRequirement::Weapon))),
        AttackMode::Basic => seq.with(SELECT_TARGETS, StepRef::step(SelectTargets)),
        AttackMode::Tech => seq,
    };
    let seq = seq
        .with(INIT, StepRef::step(InitAttack(mode)))
        .with(SHOW_HUD, StepRef::step(ShowHud))
        .with(ROLL, StepRef::step(RollAttack));
    let seq = match mode {
        AttackMode::Weapon => seq
            .with(SELF_HEAT, StepRef::step(SelfHeat))
            .with(CONSUME, StepRef::step(ConsumeItem)),
        AttackMode::Tech => seq.with(SELF_HEAT, StepRef::step(SelfHeat)),
        AttackMode::Basic => seq,
    };
    seq.with(RECORD, StepRef::step(RecordAttack))
        .with(RENDER, StepRef::step(RenderMessage))
}

/// An attack with a weapon item.
#[derive(Debug)]
pub struct WeaponAttackFlow;

impl FlowKind for WeaponAttackFlow {
    type Payload = AttackPayload;
    const NAME: &'static str = "WeaponAttackFlow";

    fn steps() -> StepSequence<AttackPayload> {
        attack_steps(AttackMode::Weapon)
    }
}

/// An improvised attack without an item.
#[derive(Debug)]
pub struct BasicAttackFlow;

impl FlowKind for BasicAttackFlow {
    type Payload = AttackPayload;
    const NAME: &'static str = "BasicAttackFlow";

    fn steps() -> StepSequence<AttackPayload> {
        attack_steps(AttackMode::Basic)
    }
}

/// A tech attack, optionally from a system item.
#[derive(Debug)]
pub struct TechAttackFlow;

impl FlowKind for TechAttackFlow {
    type Payload = AttackPayload;
    const NAME: &'static str = "TechAttackFlow";

    fn steps() -> StepSequence<AttackPayload> {
        attack_steps(AttackMode::Tech)
    }
}
