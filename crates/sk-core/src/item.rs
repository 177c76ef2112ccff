use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::track::Track;

/// Weapon tag that grants +1 accuracy.
pub const TAG_ACCURATE: &str = "tg_accurate";
/// Weapon tag that imposes +1 difficulty.
pub const TAG_INACCURATE: &str = "tg_inaccurate";
/// Weapon tag that ignores cover.
pub const TAG_SEEKING: &str = "tg_seeking";
/// Weapon tag requiring a reload after each attack.
pub const TAG_LOADING: &str = "tg_loading";
/// Tag limiting an item to a number of uses.
pub const TAG_LIMITED: &str = "tg_limited";
/// Weapon tag guaranteeing minimum damage on a miss.
pub const TAG_RELIABLE: &str = "tg_reliable";
/// Weapon tag that explodes damage dice of 1 into heat.
pub const TAG_OVERKILL: &str = "tg_overkill";
/// Weapon tag whose damage ignores armor.
pub const TAG_AP: &str = "tg_ap";
/// Tag inflicting heat on the user when fired or activated.
pub const TAG_HEAT_SELF: &str = "tg_heat_self";

/// Unique identifier for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Generate a new random item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// An identifier plus optional numeric value, e.g. `tg_heat_self` with `2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag identifier such as `tg_seeking`.
    pub id: String,
    /// Optional numeric argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<i32>,
}

impl Tag {
    /// A tag with no value.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            val: None,
        }
    }

    /// A tag carrying a value.
    pub fn with_val(id: impl Into<String>, val: i32) -> Self {
        Self {
            id: id.into(),
            val: Some(val),
        }
    }

    /// Case-insensitive identifier comparison.
    pub fn is(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

/// Weapon category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    /// Hand-to-hand weapons.
    Melee,
    /// Close-quarters guns.
    Cqb,
    /// Long guns.
    Rifle,
    /// Missile and grenade launchers.
    Launcher,
    /// Heavy artillery.
    Cannon,
    /// Drone swarms.
    Nexus,
}

impl WeaponType {
    /// Whether attacks with this weapon are melee attacks.
    pub fn is_melee(self) -> bool {
        matches!(self, Self::Melee)
    }
}

impl fmt::Display for WeaponType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Melee => write!(f, "Melee"),
            Self::Cqb => write!(f, "CQB"),
            Self::Rifle => write!(f, "Rifle"),
            Self::Launcher => write!(f, "Launcher"),
            Self::Cannon => write!(f, "Cannon"),
            Self::Nexus => write!(f, "Nexus"),
        }
    }
}

/// Weapon mount size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSize {
    /// Auxiliary mount.
    Auxiliary,
    /// Main mount.
    Main,
    /// Heavy mount.
    Heavy,
    /// Superheavy mount.
    Superheavy,
}

impl fmt::Display for WeaponSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auxiliary => write!(f, "Auxiliary"),
            Self::Main => write!(f, "Main"),
            Self::Heavy => write!(f, "Heavy"),
            Self::Superheavy => write!(f, "Superheavy"),
        }
    }
}

/// Damage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Physical impact.
    Kinetic,
    /// Blast damage.
    Explosive,
    /// Directed energy.
    Energy,
    /// Ongoing burn.
    Burn,
    /// Heat applied to the target.
    Heat,
    /// Chosen at the time of the attack.
    Variable,
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kinetic => write!(f, "Kinetic"),
            Self::Explosive => write!(f, "Explosive"),
            Self::Energy => write!(f, "Energy"),
            Self::Burn => write!(f, "Burn"),
            Self::Heat => write!(f, "Heat"),
            Self::Variable => write!(f, "Variable"),
        }
    }
}

/// One damage entry, with a dice formula such as `1d6+2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Damage {
    /// Damage type.
    #[serde(rename = "type")]
    pub kind: DamageType,
    /// Dice formula.
    pub val: String,
}

impl Damage {
    /// Construct a damage entry.
    pub fn new(kind: DamageType, val: impl Into<String>) -> Self {
        Self {
            kind,
            val: val.into(),
        }
    }
}

/// Statistics specific to weapons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponProfile {
    /// Weapon category.
    #[serde(rename = "type")]
    pub weapon_type: WeaponType,
    /// Mount size.
    pub size: WeaponSize,
    /// Damage dealt on hit.
    #[serde(default)]
    pub damage: Vec<Damage>,
    /// Maximum range in spaces.
    #[serde(default = "default_range")]
    pub range: u32,
}

fn default_range() -> u32 {
    1
}

/// Statistics specific to systems and other activatable gear.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemProfile {
    /// Rules text shown when activated.
    #[serde(default)]
    pub effect: String,
}

/// What kind of item something is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    /// A weapon that can attack.
    Weapon(WeaponProfile),
    /// A system that can be activated.
    System(SystemProfile),
}

/// An item owned by a combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier.
    #[serde(default)]
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Weapon or system profile.
    #[serde(flatten)]
    pub kind: ItemKind,
    /// Tags such as `tg_seeking`.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Whether the item has been destroyed.
    #[serde(default)]
    pub destroyed: bool,
    /// Whether a loading weapon is currently loaded.
    #[serde(default = "default_loaded")]
    pub loaded: bool,
    /// Remaining uses for limited items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<Track>,
}

fn default_loaded() -> bool {
    true
}

impl Item {
    /// Create a weapon with the given profile.
    pub fn weapon(name: impl Into<String>, profile: WeaponProfile) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            kind: ItemKind::Weapon(profile),
            tags: Vec::new(),
            destroyed: false,
            loaded: true,
            uses: None,
        }
    }

    /// Create a system with the given effect text.
    pub fn system(name: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            kind: ItemKind::System(SystemProfile {
                effect: effect.into(),
            }),
            tags: Vec::new(),
            destroyed: false,
            loaded: true,
            uses: None,
        }
    }

    /// Builder-style tag attachment.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// The weapon profile, if this item is a weapon.
    pub fn weapon_profile(&self) -> Option<&WeaponProfile> {
        match &self.kind {
            ItemKind::Weapon(p) => Some(p),
            ItemKind::System(_) => None,
        }
    }

    /// Whether the item carries the given tag.
    pub fn has_tag(&self, id: &str) -> bool {
        self.tags.iter().any(|t| t.is(id))
    }

    /// The numeric value of a tag, if present and valued.
    pub fn tag_value(&self, id: &str) -> Option<i32> {
        self.tags.iter().find(|t| t.is(id)).and_then(|t| t.val)
    }

    /// Whether the item is a loading weapon that has been fired.
    pub fn is_unloaded(&self) -> bool {
        self.has_tag(TAG_LOADING) && !self.loaded
    }

    /// Whether a limited item has no uses left.
    pub fn is_exhausted(&self) -> bool {
        self.has_tag(TAG_LIMITED) && self.uses.is_some_and(|u| u.is_empty())
    }
}
