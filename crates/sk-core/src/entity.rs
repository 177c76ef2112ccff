use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::{Item, ItemId};
use crate::track::Track;

/// Unique identifier for every combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// What sort of combatant an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A piloted mech.
    #[default]
    Mech,
    /// A pilot outside their mech.
    Pilot,
    /// A GM-controlled combatant.
    Npc,
    /// A drone, turret, or other deployable.
    Deployable,
}

impl EntityKind {
    /// Whether this kind tracks structure and stress.
    pub fn has_structure(self) -> bool {
        matches!(self, Self::Mech | Self::Npc)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mech => write!(f, "mech"),
            Self::Pilot => write!(f, "pilot"),
            Self::Npc => write!(f, "npc"),
            Self::Deployable => write!(f, "deployable"),
        }
    }
}

/// Which side a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Allied with the players.
    #[default]
    Friendly,
    /// Neither side.
    Neutral,
    /// Opposed to the players.
    Hostile,
}

/// A status or condition currently affecting a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// -1 difficulty on all attacks, saves, and checks.
    Impaired,
    /// Adjacent to a hostile combatant.
    Engaged,
    /// Knocked down; attacks against it gain accuracy.
    Prone,
    /// Marked for a follow-up attack.
    LockOn,
    /// Overheated plating; damage is not halved.
    Exposed,
    /// Powered down.
    Shutdown,
    /// Prepared for the next check.
    Bolstered,
    /// Hard to see; attacks may miss outright.
    Invisible,
    /// Cannot move.
    Immobilized,
    /// Can only make standard moves.
    Slowed,
    /// Cannot take reactions or skill checks.
    Jammed,
    /// Cannot act.
    Stunned,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Impaired => "Impaired",
            Self::Engaged => "Engaged",
            Self::Prone => "Prone",
            Self::LockOn => "Lock On",
            Self::Exposed => "Exposed",
            Self::Shutdown => "Shut Down",
            Self::Bolstered => "Bolstered",
            Self::Invisible => "Invisible",
            Self::Immobilized => "Immobilized",
            Self::Slowed => "Slowed",
            Self::Jammed => "Jammed",
            Self::Stunned => "Stunned",
        };
        write!(f, "{name}")
    }
}

/// One of the four core stats used for checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    /// Toughness and brute force.
    Hull,
    /// Speed and evasion.
    Agility,
    /// Electronic warfare.
    Systems,
    /// Heat management and reactor output.
    Engineering,
    /// Pilot grit, used by pilots in place of stats.
    Grit,
}

impl Stat {
    /// Parse a stat from a case-insensitive name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hull" => Some(Self::Hull),
            "agility" | "agi" => Some(Self::Agility),
            "systems" | "sys" => Some(Self::Systems),
            "engineering" | "eng" => Some(Self::Engineering),
            "grit" => Some(Self::Grit),
            _ => None,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hull => write!(f, "HULL"),
            Self::Agility => write!(f, "AGILITY"),
            Self::Systems => write!(f, "SYSTEMS"),
            Self::Engineering => write!(f, "ENGINEERING"),
            Self::Grit => write!(f, "GRIT"),
        }
    }
}

/// The four core stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Hull.
    pub hull: i32,
    /// Agility.
    pub agility: i32,
    /// Systems.
    pub systems: i32,
    /// Engineering.
    pub engineering: i32,
}

/// Defensive values attacks and tech attacks roll against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defenses {
    /// Target number for weapon attacks.
    pub evasion: i32,
    /// Target number for tech attacks.
    pub e_defense: i32,
    /// Flat damage reduction.
    pub armor: i32,
}

impl Default for Defenses {
    fn default() -> Self {
        Self {
            evasion: 8,
            e_defense: 8,
            armor: 0,
        }
    }
}

/// A combatant: anything that can act or be targeted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    #[serde(default)]
    pub id: EntityId,
    /// The kind of combatant.
    #[serde(default)]
    pub kind: EntityKind,
    /// Display name.
    pub name: String,
    /// Which side the combatant is on.
    #[serde(default)]
    pub disposition: Disposition,
    /// Flat bonus added to attack rolls.
    #[serde(default)]
    pub grit: i32,
    /// Flat bonus added to tech attack rolls.
    #[serde(default)]
    pub tech_attack: i32,
    /// Core stats.
    #[serde(default)]
    pub stats: Stats,
    /// Defensive values.
    #[serde(default)]
    pub defenses: Defenses,
    /// Hit points.
    #[serde(default = "default_hp")]
    pub hp: Track,
    /// Structure; at zero the mech is destroyed.
    #[serde(default = "default_structure")]
    pub structure: Track,
    /// Reactor stress; at zero the reactor melts down.
    #[serde(default = "default_structure")]
    pub stress: Track,
    /// Current heat against heat capacity.
    #[serde(default = "default_heat")]
    pub heat: Track,
    /// Active conditions and statuses.
    #[serde(default)]
    pub conditions: BTreeSet<Condition>,
    /// Talents and their ranks, keyed by talent identifier.
    #[serde(default)]
    pub talents: BTreeMap<String, u8>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owned items.
    #[serde(default)]
    pub items: Vec<Item>,
}

fn default_hp() -> Track {
    Track::full(10)
}

fn default_structure() -> Track {
    Track::full(4)
}

fn default_heat() -> Track {
    Track::empty(6)
}

impl Entity {
    /// Create a combatant with default stats and a random ID.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            kind,
            name: name.into(),
            disposition: Disposition::default(),
            grit: 0,
            tech_attack: 0,
            stats: Stats::default(),
            defenses: Defenses::default(),
            hp: default_hp(),
            structure: default_structure(),
            stress: default_structure(),
            heat: default_heat(),
            conditions: BTreeSet::new(),
            talents: BTreeMap::new(),
            tags: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Whether the combatant currently has the given condition.
    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }

    /// The rank held in a talent, or 0.
    pub fn talent_rank(&self, talent: &str) -> u8 {
        self.talents.get(talent).copied().unwrap_or(0)
    }

    /// Value of a stat, with grit standing in for pilots.
    pub fn stat(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Hull => self.stats.hull,
            Stat::Agility => self.stats.agility,
            Stat::Systems => self.stats.systems,
            Stat::Engineering => self.stats.engineering,
            Stat::Grit => self.grit,
        }
    }

    /// Look up an owned item.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Look up an owned item mutably.
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Find an owned item by case-insensitive name.
    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_display_shows_short_form() {
        let id = EntityId(Uuid::parse_str("a3f2b1c8-1234-5678-9abc-def012345678").unwrap());
        assert_eq!(id.to_string(), "a3f2b1c8");
    }

    #[test]
    fn stat_parse() {
        assert_eq!(Stat::parse("HULL"), Some(Stat::Hull));
        assert_eq!(Stat::parse("agi"), Some(Stat::Agility));
        assert_eq!(Stat::parse("luck"), None);
    }

    #[test]
    fn pilots_use_grit_for_grit_checks() {
        let mut e = Entity::new(EntityKind::Pilot, "Rook");
        e.grit = 3;
        e.stats.hull = 1;
        assert_eq!(e.stat(Stat::Grit), 3);
        assert_eq!(e.stat(Stat::Hull), 1);
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let e: Entity = serde_json::from_str(r#"{ "name": "Drone" }"#).unwrap();
        assert_eq!(e.kind, EntityKind::Mech);
        assert_eq!(e.structure.max, 4);
        assert!(e.heat.is_empty());
        assert_eq!(e.defenses.evasion, 8);
    }

    #[test]
    fn talent_rank_defaults_to_zero() {
        let mut e = Entity::new(EntityKind::Mech, "Kestrel");
        e.talents.insert("t_brawler".to_string(), 2);
        assert_eq!(e.talent_rank("t_brawler"), 2);
        assert_eq!(e.talent_rank("t_ace"), 0);
    }

    #[test]
    fn condition_display() {
        assert_eq!(Condition::LockOn.to_string(), "Lock On");
        assert_eq!(Condition::Shutdown.to_string(), "Shut Down");
    }
}
