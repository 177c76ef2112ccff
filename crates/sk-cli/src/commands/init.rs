use std::path::Path;

use sk_core::item::{TAG_HEAT_SELF, TAG_LIMITED, TAG_LOADING, TAG_RELIABLE};
use sk_core::{
    Damage, DamageType, Disposition, Encounter, Entity, EntityKind, Item, Tag, Track,
    WeaponProfile, WeaponSize, WeaponType,
};
use sk_mechanics::plugins::STEADY_AIM;

fn weapon(name: &str, weapon_type: WeaponType, size: WeaponSize, damage: Damage, range: u32) -> Item {
    Item::weapon(
        name,
        WeaponProfile {
            weapon_type,
            size,
            damage: vec![damage],
            range,
        },
    )
}

fn sample() -> Result<Encounter, String> {
    let mut atlas = Entity::new(EntityKind::Mech, "Atlas");
    atlas.grit = 2;
    atlas.tech_attack = 1;
    atlas.stats.hull = 1;
    atlas.stats.agility = 1;
    atlas.stats.systems = 1;
    atlas.talents.insert(STEADY_AIM.to_string(), 1);
    let mut rack = weapon(
        "Missile Rack",
        WeaponType::Launcher,
        WeaponSize::Main,
        Damage::new(DamageType::Explosive, "1d6"),
        10,
    )
    .with_tag(Tag::new(TAG_LIMITED));
    rack.uses = Some(Track::full(3));
    atlas.items = vec![
        weapon(
            "Assault Rifle",
            WeaponType::Rifle,
            WeaponSize::Main,
            Damage::new(DamageType::Kinetic, "1d6"),
            10,
        )
        .with_tag(Tag::with_val(TAG_RELIABLE, 2)),
        weapon(
            "Howitzer",
            WeaponType::Cannon,
            WeaponSize::Heavy,
            Damage::new(DamageType::Explosive, "2d6"),
            15,
        )
        .with_tag(Tag::new(TAG_LOADING))
        .with_tag(Tag::with_val(TAG_HEAT_SELF, 2)),
        weapon(
            "Knife",
            WeaponType::Melee,
            WeaponSize::Auxiliary,
            Damage::new(DamageType::Kinetic, "1d3"),
            1,
        ),
        rack,
        Item::system("Shield Projector", "Gain 4 overshield until the end of your next turn.")
            .with_tag(Tag::with_val(TAG_HEAT_SELF, 1)),
    ];

    let mut drone = Entity::new(EntityKind::Npc, "Drone");
    drone.disposition = Disposition::Hostile;
    drone.defenses.evasion = 10;
    drone.defenses.e_defense = 10;

    let mut brute = Entity::new(EntityKind::Npc, "Brute");
    brute.disposition = Disposition::Hostile;
    brute.defenses.evasion = 6;

    let pilot = Entity::new(EntityKind::Pilot, "Vega");

    let encounter = Encounter::new();
    let err = |e: sk_core::CoreError| e.to_string();
    let atlas = encounter.add_entity(atlas);
    encounter.place(atlas, (0, 0)).map_err(err)?;
    let drone = encounter.add_entity(drone);
    let drone = encounter.place(drone, (6, 0)).map_err(err)?;
    let brute = encounter.add_entity(brute);
    encounter.place(brute, (1, 1)).map_err(err)?;
    encounter.add_entity(pilot);
    encounter.set_targets(vec![drone]);
    Ok(encounter)
}

pub fn run(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    sample()?
        .save(path)
        .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    println!("  Wrote sample encounter to {}", path.display());
    Ok(())
}
