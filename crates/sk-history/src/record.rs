//! Action records appended to the history log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sk_core::{Item, ItemId, TokenId, WeaponSize, WeaponType};

/// What kind of action a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A weapon or basic attack.
    Attack,
    /// A tech attack.
    TechAttack,
    /// A damage roll.
    Damage,
    /// A stat check.
    Stat,
    /// A structure check.
    Structure,
    /// An overheat (stress) check.
    Overheat,
    /// A system activation.
    Activation,
}

/// The outcome of an action against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    /// The targeted token.
    pub token: TokenId,
    /// Whether the attack hit.
    pub hit: bool,
    /// Whether the attack was a critical hit.
    pub crit: bool,
}

/// One resolved action. Appended once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The action kind.
    pub kind: ActionKind,
    /// The item used, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
    /// Weapon category, for weapon actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_type: Option<WeaponType>,
    /// Weapon mount size, for weapon actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_size: Option<WeaponSize>,
    /// Whether this was a melee action.
    #[serde(default)]
    pub melee: bool,
    /// Per-target outcomes.
    #[serde(default)]
    pub hits: Vec<HitRecord>,
    /// Serialized roll context as it was when the action resolved.
    #[serde(default)]
    pub snapshot: serde_json::Value,
    /// When the action resolved.
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    /// A bare record of the given kind, stamped now.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            item: None,
            weapon_type: None,
            weapon_size: None,
            melee: false,
            hits: Vec::new(),
            snapshot: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attach the item used, copying weapon traits when it is a weapon.
    pub fn with_item(mut self, item: &Item) -> Self {
        self.item = Some(item.id);
        if let Some(profile) = item.weapon_profile() {
            self.weapon_type = Some(profile.weapon_type);
            self.weapon_size = Some(profile.size);
            self.melee = profile.weapon_type.is_melee();
        }
        self
    }

    /// Override the melee flag.
    pub fn with_melee(mut self, melee: bool) -> Self {
        self.melee = melee;
        self
    }

    /// Attach per-target outcomes.
    pub fn with_hits(mut self, hits: Vec<HitRecord>) -> Self {
        self.hits = hits;
        self
    }

    /// Attach a roll context snapshot.
    pub fn with_snapshot(mut self, snapshot: serde_json::Value) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Whether any target was hit.
    pub fn any_hit(&self) -> bool {
        self.hits.iter().any(|h| h.hit)
    }

    /// Whether the action was a melee attack with an auxiliary weapon.
    pub fn is_auxiliary_melee(&self) -> bool {
        self.kind == ActionKind::Attack
            && self.melee
            && self.weapon_size == Some(WeaponSize::Auxiliary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_core::{Damage, DamageType, WeaponProfile};

    fn knife() -> Item {
        Item::weapon(
            "Knife",
            WeaponProfile {
                weapon_type: WeaponType::Melee,
                size: WeaponSize::Auxiliary,
                damage: vec![Damage::new(DamageType::Kinetic, "1d3")],
                range: 1,
            },
        )
    }

    #[test]
    fn with_item_copies_weapon_traits() {
        let item = knife();
        let rec = ActionRecord::new(ActionKind::Attack).with_item(&item);
        assert_eq!(rec.item, Some(item.id));
        assert_eq!(rec.weapon_type, Some(WeaponType::Melee));
        assert!(rec.melee);
        assert!(rec.is_auxiliary_melee());
    }

    #[test]
    fn system_item_has_no_weapon_traits() {
        let item = Item::system("Flares", "Smoke");
        let rec = ActionRecord::new(ActionKind::Activation).with_item(&item);
        assert!(rec.weapon_type.is_none());
        assert!(!rec.melee);
        assert!(!rec.is_auxiliary_melee());
    }

    #[test]
    fn any_hit() {
        let token = TokenId::new();
        let rec = ActionRecord::new(ActionKind::Attack).with_hits(vec![
            HitRecord {
                token,
                hit: false,
                crit: false,
            },
            HitRecord {
                token: TokenId::new(),
                hit: true,
                crit: false,
            },
        ]);
        assert!(rec.any_hit());
        assert!(!ActionRecord::new(ActionKind::Attack).any_hit());
    }
}
