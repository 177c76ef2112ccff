//! End-to-end flow resolution against an in-memory encounter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};

use serde_json::json;
use sk_core::item::{TAG_HEAT_SELF, TAG_LIMITED, TAG_LOADING};
use sk_core::{
    AutomationConfig, Condition, Damage, DamageType, DocRef, Encounter, Entity, EntityId,
    EntityKind, EntityPatch, EntityProvider, Item, ItemId, ItemPatch, Stat, Tag, TokenId, Track,
    WeaponProfile, WeaponSize, WeaponType,
};
use sk_flow::flows::attack::ROLL;
use sk_flow::flows::structure::SYSTEM_TRAUMA;
use sk_flow::flows::{
    ActivationFlow, ActivationPayload, AttackPayload, BasicAttackFlow, OverheatFlow,
    OverheatOutcome, OverheatPayload, StatPayload, StatRollFlow, StructureFlow, StructureOutcome,
    StructurePayload, SystemTraumaFlow, TechAttackFlow, WeaponAttackFlow,
};
use sk_flow::{
    FlowError, FlowServices, HudAnswer, HudRequest, MemoryChat, StepRef, Template,
};
use sk_history::ActionKind;
use sk_mechanics::DiceEvaluator;
use sk_mechanics::plugins::POINT_BLANK;

struct Table {
    encounter: Arc<Encounter>,
    services: Arc<FlowServices>,
    chat: Arc<MemoryChat>,
    dice: Arc<DiceEvaluator>,
    atlas: EntityId,
    drone: TokenId,
    rifle: ItemId,
    cannon: ItemId,
    rack: ItemId,
    shield: ItemId,
}

fn weapon(name: &str, weapon_type: WeaponType, damage: &str) -> Item {
    Item::weapon(
        name,
        WeaponProfile {
            weapon_type,
            size: WeaponSize::Main,
            damage: vec![Damage::new(DamageType::Kinetic, damage)],
            range: 10,
        },
    )
}

fn table(config: AutomationConfig) -> Table {
    let rifle = weapon("Rifle", WeaponType::Rifle, "1d6");
    let cannon = weapon("Cannon", WeaponType::Cannon, "2d6")
        .with_tag(Tag::new(TAG_LOADING))
        .with_tag(Tag::with_val(TAG_HEAT_SELF, 2));
    let mut rack = weapon("Missile Rack", WeaponType::Launcher, "1d6").with_tag(Tag::new(TAG_LIMITED));
    rack.uses = Some(Track::full(2));
    let shield = Item::system("Shield", "Gain 5 overshield").with_tag(Tag::with_val(TAG_HEAT_SELF, 1));
    let ids = (rifle.id, cannon.id, rack.id, shield.id);

    let mut atlas = Entity::new(EntityKind::Mech, "Atlas");
    atlas.stats.hull = 2;
    atlas.items = vec![rifle, cannon, rack, shield];

    let mut drone = Entity::new(EntityKind::Npc, "Drone");
    drone.defenses.evasion = 10;

    let encounter = Arc::new(Encounter::new());
    let atlas = encounter.add_entity(atlas);
    encounter.place(atlas, (0, 0)).unwrap();
    let drone_id = encounter.add_entity(drone);
    let drone = encounter.place(drone_id, (5, 0)).unwrap();
    encounter.set_targets(vec![drone]);

    let chat = Arc::new(MemoryChat::new());
    let dice = Arc::new(DiceEvaluator::scripted(Vec::new()));
    let services = FlowServices::for_encounter(Arc::clone(&encounter))
        .with_config(config)
        .with_evaluator(dice.clone())
        .with_chat(chat.clone())
        .build();
    {
        let mut history = services.history.write().unwrap_or_else(PoisonError::into_inner);
        history.start_round();
        history.start_turn(atlas).unwrap();
    }
    Table {
        encounter,
        services,
        chat,
        dice,
        atlas,
        drone,
        rifle: ids.0,
        cannon: ids.1,
        rack: ids.2,
        shield: ids.3,
    }
}

fn quiet() -> AutomationConfig {
    AutomationConfig::default().with_prompt(false)
}

impl Table {
    fn item_ref(&self, item: ItemId) -> DocRef {
        DocRef::owned_item(self.atlas, item)
    }

    fn actor(&self) -> Entity {
        self.encounter.entity(self.atlas).unwrap()
    }

    fn actions(&self) -> Vec<ActionKind> {
        let history = self.services.history.read().unwrap_or_else(PoisonError::into_inner);
        history
            .current_turn_actions(self.atlas)
            .iter()
            .map(|a| a.kind)
            .collect()
    }

    async fn fire(&self, item: ItemId) -> bool {
        let mut flow = self
            .services
            .flow::<WeaponAttackFlow>(&self.item_ref(item), AttackPayload::default())
            .unwrap();
        flow.begin(None).await.unwrap()
    }
}

#[tokio::test]
async fn weapon_hit_offers_damage_follow_up() {
    let t = table(quiet());
    t.dice.queue([15]);
    let mut flow = t
        .services
        .flow::<WeaponAttackFlow>(&t.item_ref(t.rifle), AttackPayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());

    let result = &flow.payload().results[0];
    assert_eq!(result.token, Some(t.drone));
    assert_eq!(result.roll.total, 15);
    assert!(result.hit);
    assert!(!result.crit);
    assert_eq!(result.defense, Some(10));

    let message = t.chat.last().unwrap();
    assert_eq!(message.template, Template::Attack);
    assert_eq!(message.speaker, "Atlas");
    let follow_up = message.flags.follow_up.unwrap();
    assert_eq!(follow_up.name, "DamageRollFlow");

    t.dice.queue([4]);
    let mut damage = t.services.restore(follow_up).unwrap();
    assert!(damage.run().await.unwrap());
    let message = t.chat.last().unwrap();
    assert_eq!(message.template, Template::Damage);
    assert_eq!(message.data["results"][0]["total"], json!(4));
    assert_eq!(t.actions(), vec![ActionKind::Attack, ActionKind::Damage]);
}

#[tokio::test]
async fn miss_has_no_follow_up_and_crit_doubles_dice() {
    let t = table(quiet());
    t.dice.queue([5]);
    assert!(t.fire(t.rifle).await);
    let message = t.chat.last().unwrap();
    assert_eq!(message.data["results"][0]["hit"], json!(false));
    assert!(message.flags.follow_up.is_none());

    t.dice.queue([20]);
    assert!(t.fire(t.rifle).await);
    let message = t.chat.last().unwrap();
    assert_eq!(message.data["results"][0]["crit"], json!(true));

    t.dice.queue([3, 5]);
    let mut damage = t.services.restore(message.flags.follow_up.unwrap()).unwrap();
    assert!(damage.run().await.unwrap());
    let message = t.chat.last().unwrap();
    assert_eq!(message.data["results"][0]["total"], json!(5));
    assert_eq!(
        message.data["results"][0]["parts"][0]["roll"]["formula"],
        json!("2d6kh1")
    );
}

#[tokio::test]
async fn loading_weapon_unloads_and_heats() {
    let t = table(quiet());
    t.dice.queue([12]);
    assert!(t.fire(t.cannon).await);
    let atlas = t.actor();
    assert_eq!(atlas.heat.value, 2);
    assert!(atlas.item(t.cannon).unwrap().is_unloaded());

    assert!(!t.fire(t.cannon).await);
    assert_eq!(t.chat.warnings(), vec!["Atlas: Cannon is not loaded".to_string()]);
    assert_eq!(t.actions(), vec![ActionKind::Attack]);
}

#[tokio::test]
async fn destroyed_weapon_is_refused() {
    let t = table(quiet());
    let mut item = ItemPatch::new(t.rifle);
    item.destroyed = Some(true);
    t.encounter
        .update(
            t.atlas,
            EntityPatch {
                items: vec![item],
                ..EntityPatch::default()
            },
        )
        .unwrap();
    assert!(!t.fire(t.rifle).await);
    assert_eq!(t.chat.warnings(), vec!["Atlas: Rifle is destroyed".to_string()]);
    assert!(t.chat.messages().is_empty());
}

#[tokio::test]
async fn limited_uses_run_out() {
    let t = table(quiet());
    t.dice.queue([11, 11]);
    assert!(t.fire(t.rack).await);
    assert!(t.fire(t.rack).await);
    assert_eq!(t.actor().item(t.rack).unwrap().uses, Some(Track::new(0, 2)));
    assert!(!t.fire(t.rack).await);
    assert_eq!(
        t.chat.warnings(),
        vec!["Atlas: Missile Rack has no uses left".to_string()]
    );
}

#[tokio::test]
async fn consumption_can_be_switched_off() {
    let t = table(quiet().with_resource_consumption(false));
    t.dice.queue([11, 11]);
    assert!(t.fire(t.rack).await);
    assert!(t.fire(t.cannon).await);
    let atlas = t.actor();
    assert_eq!(atlas.item(t.rack).unwrap().uses, Some(Track::full(2)));
    assert!(!atlas.item(t.cannon).unwrap().is_unloaded());
}

#[tokio::test]
async fn false_step_aborts_cleanly() {
    let t = table(quiet());
    let mut flow = t
        .services
        .flow::<WeaponAttackFlow>(&t.item_ref(t.rifle), AttackPayload::default())
        .unwrap();
    flow.steps_mut()
        .insert_before(ROLL, "veto", StepRef::from_fn(|_, _| Ok(false)))
        .unwrap();
    assert!(!flow.begin(None).await.unwrap());
    assert!(flow.payload().results.is_empty());
    assert!(t.chat.messages().is_empty());
    assert!(t.actions().is_empty());
}

fn counter<P: Send + 'static>(count: &Arc<AtomicUsize>, result: bool) -> StepRef<P> {
    let count = Arc::clone(count);
    StepRef::from_fn(move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(result)
    })
}

#[tokio::test]
async fn steps_before_a_veto_run_once_and_none_after() {
    let t = table(quiet());
    let mut flow = t
        .services
        .flow::<WeaponAttackFlow>(&t.item_ref(t.rifle), AttackPayload::default())
        .unwrap();
    let keys: Vec<String> = flow.steps_mut().keys().map(String::from).collect();
    let counts: Vec<Arc<AtomicUsize>> = keys.iter().map(|_| Arc::default()).collect();
    for (key, count) in keys.iter().zip(&counts) {
        flow.steps_mut()
            .insert_after(key, format!("{key}_ran"), counter(count, true))
            .unwrap();
    }
    let vetoes = Arc::new(AtomicUsize::new(0));
    flow.steps_mut()
        .insert_before(ROLL, "veto", counter(&vetoes, false))
        .unwrap();

    assert!(!flow.begin(None).await.unwrap());
    assert_eq!(vetoes.load(Ordering::SeqCst), 1);
    let roll_at = keys.iter().position(|k| k == ROLL).unwrap();
    assert!(roll_at > 0);
    for (i, (key, count)) in keys.iter().zip(&counts).enumerate() {
        let expected = usize::from(i < roll_at);
        assert_eq!(count.load(Ordering::SeqCst), expected, "step {key}");
    }
}

#[tokio::test]
async fn vetoed_nested_flow_aborts_its_parent() {
    let t = table(quiet());
    t.services
        .flows
        .modify::<SystemTraumaFlow>(|seq| {
            seq.insert_before(ROLL, "veto", StepRef::from_fn(|_, _| Ok(false)))
        })
        .unwrap();
    t.dice.queue([3]);
    let mut flow = t
        .services
        .flow::<StructureFlow>(&DocRef::Actor(t.atlas), StructurePayload::default())
        .unwrap();
    let after = Arc::new(AtomicUsize::new(0));
    flow.steps_mut()
        .insert_after(SYSTEM_TRAUMA, "after_trauma", counter(&after, true))
        .unwrap();

    assert!(!flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().outcome, Some(StructureOutcome::SystemTrauma));
    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert!(t.chat.messages().is_empty());
    assert!(t.actions().is_empty());
    assert!(!t.actor().item(t.rifle).unwrap().destroyed);
    // No rollback: the structure already lost stays lost.
    assert_eq!(t.actor().structure.value, 3);
}

#[tokio::test]
async fn step_error_propagates() {
    let t = table(quiet());
    let mut flow = t
        .services
        .flow::<StatRollFlow>(&DocRef::Actor(t.atlas), StatPayload::new(Stat::Hull))
        .unwrap();
    flow.steps_mut()
        .insert_after(
            ROLL,
            "explode",
            StepRef::from_fn(|state, _| {
                Err(FlowError::Payload {
                    flow: state.name.clone(),
                    reason: "boom".into(),
                })
            }),
        )
        .unwrap();
    t.dice.queue([10]);
    let err = flow.begin(None).await.unwrap_err();
    assert!(matches!(err, FlowError::Payload { ref reason, .. } if reason == "boom"));
    assert!(t.chat.messages().is_empty());
}

#[tokio::test]
async fn registry_edits_apply_to_later_flows_only() {
    let t = table(quiet());
    let atlas = DocRef::Actor(t.atlas);
    let mut before = t
        .services
        .flow::<StatRollFlow>(&atlas, StatPayload::new(Stat::Hull))
        .unwrap();
    t.services
        .flows
        .modify::<StatRollFlow>(|seq| {
            seq.insert_after(
                ROLL,
                "mark",
                StepRef::<StatPayload>::from_fn(|state, _| {
                    state.payload.title = "Marked".into();
                    Ok(true)
                }),
            )
        })
        .unwrap();
    let mut after = t
        .services
        .flow::<StatRollFlow>(&atlas, StatPayload::new(Stat::Hull))
        .unwrap();
    assert!(!before.steps_mut().contains("mark"));
    assert!(after.steps_mut().contains("mark"));

    t.dice.queue([10, 10]);
    assert!(before.begin(None).await.unwrap());
    assert!(after.begin(None).await.unwrap());
    assert_eq!(before.payload().title, "HULL check");
    assert_eq!(after.payload().title, "Marked");
}

#[tokio::test]
async fn modifying_an_unregistered_kind_fails() {
    let t = table(quiet());
    let services = FlowServices::for_encounter(Arc::clone(&t.encounter))
        .with_flows(sk_flow::FlowRegistry::new())
        .build();
    let err = services
        .flows
        .modify::<StatRollFlow>(|_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, FlowError::UnknownFlow(ref name) if name == "StatRollFlow"));
}

#[tokio::test]
async fn stat_check_and_reroll() {
    let t = table(quiet());
    t.dice.queue([9]);
    let mut flow = t
        .services
        .flow::<StatRollFlow>(&DocRef::Actor(t.atlas), StatPayload::new(Stat::Hull))
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().bonus, 2);
    assert!(flow.payload().success);

    let message = t.chat.last().unwrap();
    assert_eq!(message.template, Template::Stat);
    t.dice.queue([3]);
    let mut reroll = t.services.restore(message.flags.reroll.unwrap()).unwrap();
    assert_eq!(reroll.name(), "StatRollFlow");
    assert!(reroll.run().await.unwrap());
    let payload = reroll.payload_value().unwrap();
    assert_eq!(payload["roll"]["total"], json!(5));
    assert_eq!(payload["success"], json!(false));
    assert_eq!(t.chat.messages().len(), 2);
}

#[tokio::test]
async fn attack_reroll_keeps_targets() {
    let t = table(quiet());
    t.dice.queue([6]);
    assert!(t.fire(t.rifle).await);
    let reroll = t.chat.last().unwrap().flags.reroll.unwrap();
    assert_eq!(reroll.source_uuid, t.item_ref(t.rifle).to_string());

    t.dice.queue([18]);
    let mut flow = t.services.restore(reroll).unwrap();
    assert!(flow.run().await.unwrap());
    let payload = flow.payload_value().unwrap();
    assert_eq!(payload["targets"], json!([t.drone]));
    assert_eq!(payload["results"][0]["roll"]["total"], json!(18));
    assert_eq!(payload["results"][0]["hit"], json!(true));
}

#[tokio::test]
async fn restoring_an_unknown_kind_fails() {
    let t = table(quiet());
    let data = sk_flow::SerializedFlow {
        name: "Nope".into(),
        source_uuid: DocRef::Actor(t.atlas).to_string(),
        payload: json!({}),
    };
    assert!(matches!(
        t.services.restore(data),
        Err(FlowError::UnknownFlow(_))
    ));
}

#[tokio::test]
async fn stat_check_without_a_stat_warns() {
    let t = table(quiet());
    let mut flow = t
        .services
        .flow::<StatRollFlow>(&DocRef::Actor(t.atlas), StatPayload::default())
        .unwrap();
    assert!(!flow.begin(None).await.unwrap());
    assert_eq!(t.chat.warnings(), vec!["Atlas: no stat selected".to_string()]);
}

#[tokio::test]
async fn missing_turn_does_not_abort() {
    let t = table(quiet());
    t.services
        .history
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .undo_turn(t.atlas);
    t.dice.queue([12]);
    let mut flow = t
        .services
        .flow::<StatRollFlow>(&DocRef::Actor(t.atlas), StatPayload::new(Stat::Hull))
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(t.chat.messages().len(), 1);
    assert!(t.actions().is_empty());
}

#[tokio::test]
async fn hud_edits_apply_before_rolling() {
    let t = table(AutomationConfig::default());
    let mut flow = t
        .services
        .flow::<WeaponAttackFlow>(&t.item_ref(t.rifle), AttackPayload::default())
        .unwrap();
    let running = tokio::spawn(async move {
        let completed = flow.begin(None).await;
        (completed, flow)
    });

    let HudRequest::Context { title, mut context } = t.services.hud.next_request().await else {
        panic!("expected a context request");
    };
    assert_eq!(title, "Rifle");
    context["base"]["accuracy"] = json!(1);
    t.dice.queue([12, 4]);
    t.services.hud.submit(HudAnswer::Context(context)).unwrap();

    let (completed, flow) = running.await.unwrap();
    assert!(completed.unwrap());
    let result = &flow.payload().results[0];
    assert_eq!(result.roll.formula, "1d20 + 0 + 1d6");
    assert_eq!(result.roll.total, 16);
}

#[tokio::test]
async fn hud_retarget_keeps_edits_and_adds_fresh_targets() {
    let t = table(AutomationConfig::default());
    let brute = t.encounter.add_entity(Entity::new(EntityKind::Npc, "Brute"));
    let brute = t.encounter.place(brute, (1, 0)).unwrap();
    let mut flow = t
        .services
        .flow::<WeaponAttackFlow>(&t.item_ref(t.rifle), AttackPayload::default())
        .unwrap();
    let running = tokio::spawn(async move {
        let completed = flow.begin(None).await;
        (completed, flow)
    });

    let HudRequest::Context { mut context, .. } = t.services.hud.next_request().await else {
        panic!("expected a context request");
    };
    context["targets"][0]["accuracy"] = json!(1);
    t.services
        .hud
        .submit(HudAnswer::Retarget {
            context,
            targets: vec![t.drone, brute],
        })
        .unwrap();

    let retargeted = |c: &serde_json::Value| c["targets"].as_array().map(Vec::len) == Some(2);
    let context = loop {
        match t.services.hud.next_request().await {
            HudRequest::Context { context, .. } if retargeted(&context) => break context,
            _ => tokio::task::yield_now().await,
        }
    };
    assert_eq!(context["targets"][0]["accuracy"], json!(1));
    assert_eq!(context["targets"][1]["accuracy"], json!(0));
    assert!(context["targets"][1]["plugins"].get(POINT_BLANK).is_some());
    t.dice.queue([12, 4, 12, 4]);
    t.services.hud.submit(HudAnswer::Context(context)).unwrap();

    let (completed, flow) = running.await.unwrap();
    assert!(completed.unwrap());
    assert_eq!(flow.payload().targets, vec![t.drone, brute]);
    let results = &flow.payload().results;
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result.roll.formula, "1d20 + 0 + 1d6");
        assert_eq!(result.roll.total, 16);
    }
    assert_eq!(results[1].token, Some(brute));
}

#[tokio::test]
async fn cancelled_hud_aborts_the_attack() {
    let t = table(AutomationConfig::default());
    let mut flow = t
        .services
        .flow::<WeaponAttackFlow>(&t.item_ref(t.rifle), AttackPayload::default())
        .unwrap();
    let running = tokio::spawn(async move { flow.begin(None).await });
    t.services.hud.next_request().await;
    assert!(t.services.hud.cancel());
    assert!(!running.await.unwrap().unwrap());
    assert!(t.chat.messages().is_empty());
    assert!(t.chat.warnings().is_empty());
}

#[tokio::test]
async fn basic_attack_uses_current_targets() {
    let t = table(quiet());
    t.dice.queue([10]);
    let mut flow = t
        .services
        .flow::<BasicAttackFlow>(&DocRef::Actor(t.atlas), AttackPayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().title, "Basic Attack");
    assert_eq!(flow.payload().targets, vec![t.drone]);
    assert!(flow.payload().results[0].hit);
}

#[tokio::test]
async fn tech_attacks_hit_e_defense_and_never_crit() {
    let t = table(quiet());
    t.dice.queue([20]);
    let mut flow = t
        .services
        .flow::<TechAttackFlow>(&DocRef::Actor(t.atlas), AttackPayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    let result = &flow.payload().results[0];
    assert_eq!(result.defense, Some(8));
    assert!(result.hit);
    assert!(!result.crit);
    assert_eq!(t.chat.last().unwrap().template, Template::TechAttack);
    assert!(t.chat.last().unwrap().flags.follow_up.is_none());
    assert_eq!(t.actions(), vec![ActionKind::TechAttack]);
}

#[tokio::test]
async fn glancing_blow_impairs() {
    let t = table(quiet());
    t.dice.queue([5]);
    let mut flow = t
        .services
        .flow::<StructureFlow>(&DocRef::Actor(t.atlas), StructurePayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().outcome, Some(StructureOutcome::GlancingBlow));
    assert_eq!(flow.payload().remaining, 3);
    let atlas = t.actor();
    assert_eq!(atlas.structure.value, 3);
    assert!(atlas.has_condition(Condition::Impaired));
    assert_eq!(t.actions(), vec![ActionKind::Structure]);
}

#[tokio::test]
async fn system_trauma_runs_nested_flow() {
    let t = table(quiet());
    t.dice.queue([3, 2]);
    let mut flow = t
        .services
        .flow::<StructureFlow>(&DocRef::Actor(t.atlas), StructurePayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().outcome, Some(StructureOutcome::SystemTrauma));
    assert!(t.actor().item(t.rifle).unwrap().destroyed);
    assert!(flow.state().actor.item(t.rifle).unwrap().destroyed);

    let templates: Vec<_> = t.chat.messages().iter().map(|m| m.template).collect();
    assert_eq!(templates, vec![Template::SystemTrauma, Template::Structure]);
    assert_eq!(t.chat.messages()[0].data["destroyed"], json!("Rifle"));
}

#[tokio::test]
async fn registry_splices_after_structure_roll() {
    let t = table(quiet());
    t.services
        .flows
        .modify::<StructureFlow>(|seq| {
            seq.insert_after(
                ROLL,
                "reroll_trauma",
                StepRef::<StructurePayload>::from_fn(|state, _| {
                    if state.payload.outcome == Some(StructureOutcome::SystemTrauma) {
                        state.payload.outcome = Some(StructureOutcome::GlancingBlow);
                    }
                    Ok(true)
                }),
            )
        })
        .unwrap();
    t.dice.queue([3]);
    let mut flow = t
        .services
        .flow::<StructureFlow>(&DocRef::Actor(t.atlas), StructurePayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().outcome, Some(StructureOutcome::GlancingBlow));
    assert!(!t.actor().item(t.rifle).unwrap().destroyed);
}

#[tokio::test]
async fn pilots_have_no_structure() {
    let t = table(quiet());
    let pilot = t.encounter.add_entity(Entity::new(EntityKind::Pilot, "Vega"));
    let mut flow = t
        .services
        .flow::<StructureFlow>(&DocRef::Actor(pilot), StructurePayload::default())
        .unwrap();
    assert!(!flow.begin(None).await.unwrap());
    assert_eq!(
        t.chat.warnings(),
        vec!["Vega: Vega has no structure or stress".to_string()]
    );
}

#[tokio::test]
async fn overheat_vents_and_exposes() {
    let t = table(quiet());
    t.encounter
        .update(
            t.atlas,
            EntityPatch {
                heat: Some(6),
                ..EntityPatch::default()
            },
        )
        .unwrap();
    t.dice.queue([4]);
    let mut flow = t
        .services
        .flow::<OverheatFlow>(&DocRef::Actor(t.atlas), OverheatPayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(
        flow.payload().outcome,
        Some(OverheatOutcome::DestabilizedPowerPlant)
    );
    let atlas = t.actor();
    assert_eq!(atlas.stress.value, 3);
    assert_eq!(atlas.heat.value, 0);
    assert!(atlas.has_condition(Condition::Exposed));
    assert_eq!(t.chat.last().unwrap().template, Template::Overheat);
}

#[tokio::test]
async fn manual_structure_leaves_tracks_alone() {
    let t = table(quiet().with_structure_automation(false));
    t.dice.queue([6]);
    let mut flow = t
        .services
        .flow::<StructureFlow>(&DocRef::Actor(t.atlas), StructurePayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    assert_eq!(flow.payload().outcome, Some(StructureOutcome::GlancingBlow));
    let atlas = t.actor();
    assert_eq!(atlas.structure.value, 4);
    assert!(atlas.conditions.is_empty());
}

#[tokio::test]
async fn system_activation() {
    let t = table(quiet());
    let mut flow = t
        .services
        .flow::<ActivationFlow>(&t.item_ref(t.shield), ActivationPayload::default())
        .unwrap();
    assert!(flow.begin(None).await.unwrap());
    let message = t.chat.last().unwrap();
    assert_eq!(message.template, Template::Activation);
    assert_eq!(message.data["effect"], json!("Gain 5 overshield"));
    assert_eq!(t.actor().heat.value, 1);
    assert_eq!(t.actions(), vec![ActionKind::Activation]);

    let mut wrong = t
        .services
        .flow::<ActivationFlow>(&t.item_ref(t.rifle), ActivationPayload::default())
        .unwrap();
    assert!(!wrong.begin(None).await.unwrap());
    assert_eq!(t.chat.warnings(), vec!["Atlas: Rifle is not a system".to_string()]);
}
