use std::sync::Arc;

use sk_core::{DocRef, Entity, Item, ItemKind, Stat};
use sk_flow::flows::{
    ActivationFlow, ActivationPayload, AttackMode, AttackPayload, BasicAttackFlow, DamageFlow,
    DamagePayload, OverheatFlow, OverheatPayload, StatPayload, StatRollFlow, StructureFlow,
    StructurePayload, TechAttackFlow, WeaponAttackFlow,
};
use sk_flow::{FlowKind, FlowServices};

use super::{Options, Session, block_on};

/// Attack modifiers from the command line.
pub struct Modifiers {
    pub accuracy: i32,
    pub difficulty: i32,
    pub targets: Vec<String>,
}

impl Modifiers {
    fn payload(&self, session: &Session, mode: AttackMode) -> Result<AttackPayload, String> {
        Ok(AttackPayload {
            accuracy: self.accuracy,
            difficulty: self.difficulty,
            ..AttackPayload::new(mode, session.targets(&self.targets)?)
        })
    }
}

async fn resolve<K: FlowKind>(
    services: &Arc<FlowServices>,
    source: &DocRef,
    payload: K::Payload,
) -> Result<(), String> {
    let mut flow = services
        .flow::<K>(source, payload)
        .map_err(|e| e.to_string())?;
    let completed = flow.begin(None).await.map_err(|e| e.to_string())?;
    if completed {
        Ok(())
    } else {
        Err(format!("{} did not complete", K::NAME))
    }
}

fn find_item<'a>(actor: &'a Entity, name: &str, kind: &str) -> Result<&'a Item, String> {
    actor
        .item_by_name(name)
        .ok_or_else(|| format!("{} has no {kind} named '{name}'", actor.name))
}

pub fn attack(
    options: &Options,
    actor: &str,
    weapon: &str,
    modifiers: &Modifiers,
    damage: bool,
) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    let item = find_item(&actor, weapon, "weapon")?;
    let source = DocRef::owned_item(actor.id, item.id);
    let payload = modifiers.payload(&session, AttackMode::Weapon)?;

    block_on(async {
        resolve::<WeaponAttackFlow>(&session.services, &source, payload).await?;
        if !damage {
            return Ok(());
        }
        let Some(follow_up) = session.chat.take_follow_up() else {
            println!("  No hits, no damage.");
            return Ok(());
        };
        let mut flow = session
            .services
            .restore(follow_up)
            .map_err(|e| e.to_string())?;
        flow.run().await.map(|_| ()).map_err(|e| e.to_string())
    })??;
    session.finish(options)
}

pub fn basic(options: &Options, actor: &str, modifiers: &Modifiers) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    let payload = modifiers.payload(&session, AttackMode::Basic)?;
    block_on(resolve::<BasicAttackFlow>(
        &session.services,
        &DocRef::Actor(actor.id),
        payload,
    ))??;
    session.finish(options)
}

pub fn tech(options: &Options, actor: &str, modifiers: &Modifiers) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    let payload = modifiers.payload(&session, AttackMode::Tech)?;
    block_on(resolve::<TechAttackFlow>(
        &session.services,
        &DocRef::Actor(actor.id),
        payload,
    ))??;
    session.finish(options)
}

pub fn damage(options: &Options, actor: &str, weapon: &str, half: bool) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    let item = find_item(&actor, weapon, "weapon")?;
    if !matches!(item.kind, ItemKind::Weapon(_)) {
        return Err(format!("{} is not a weapon", item.name));
    }
    let source = DocRef::owned_item(actor.id, item.id);
    let payload = DamagePayload {
        half,
        ..DamagePayload::default()
    };
    block_on(resolve::<DamageFlow>(&session.services, &source, payload))??;
    session.finish(options)
}

pub fn stat(options: &Options, actor: &str, stat: &str) -> Result<(), String> {
    let stat = Stat::parse(stat).ok_or_else(|| format!("unknown stat '{stat}'"))?;
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    block_on(resolve::<StatRollFlow>(
        &session.services,
        &DocRef::Actor(actor.id),
        StatPayload::new(stat),
    ))??;
    session.finish(options)
}

pub fn structure(options: &Options, actor: &str) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    block_on(resolve::<StructureFlow>(
        &session.services,
        &DocRef::Actor(actor.id),
        StructurePayload::default(),
    ))??;
    session.finish(options)
}

pub fn overheat(options: &Options, actor: &str) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    block_on(resolve::<OverheatFlow>(
        &session.services,
        &DocRef::Actor(actor.id),
        OverheatPayload::default(),
    ))??;
    session.finish(options)
}

pub fn activate(options: &Options, actor: &str, system: &str) -> Result<(), String> {
    let session = Session::open(options)?;
    let actor = session.actor(actor)?;
    let item = find_item(&actor, system, "system")?;
    let source = DocRef::owned_item(actor.id, item.id);
    block_on(resolve::<ActivationFlow>(
        &session.services,
        &source,
        ActivationPayload::default(),
    ))??;
    session.finish(options)
}
