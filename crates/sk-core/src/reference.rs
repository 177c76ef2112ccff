//! String references to combatants, items, and tokens.
//!
//! References follow a dotted path syntax:
//! - `Actor.<uuid>`: a combatant
//! - `Actor.<uuid>.Item.<uuid>`: an item owned by a combatant
//! - `Item.<uuid>`: an item with no owner (never a valid action source)
//! - `Token.<uuid>`: a token on a scene

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, EntityId};
use crate::error::CoreError;
use crate::item::{Item, ItemId};
use crate::token::TokenId;

/// A parsed document reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DocRef {
    /// A combatant.
    Actor(EntityId),
    /// An item owned by a combatant.
    OwnedItem {
        /// The owner.
        actor: EntityId,
        /// The item.
        item: ItemId,
    },
    /// An item outside any combatant's inventory.
    Item(ItemId),
    /// A token placed on a scene.
    Token(TokenId),
}

impl DocRef {
    /// Reference to an item owned by a combatant.
    pub fn owned_item(actor: EntityId, item: ItemId) -> Self {
        Self::OwnedItem { actor, item }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor(id) => write!(f, "Actor.{}", id.0),
            Self::OwnedItem { actor, item } => write!(f, "Actor.{}.Item.{}", actor.0, item.0),
            Self::Item(id) => write!(f, "Item.{}", id.0),
            Self::Token(id) => write!(f, "Token.{}", id.0),
        }
    }
}

fn parse_uuid(raw: &str, s: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(raw).map_err(|_| CoreError::InvalidReference(s.to_string()))
}

impl FromStr for DocRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            ["Actor", actor] => Ok(Self::Actor(EntityId(parse_uuid(actor, s)?))),
            ["Actor", actor, "Item", item] => Ok(Self::OwnedItem {
                actor: EntityId(parse_uuid(actor, s)?),
                item: ItemId(parse_uuid(item, s)?),
            }),
            ["Item", item] => Ok(Self::Item(ItemId(parse_uuid(item, s)?))),
            ["Token", token] => Ok(Self::Token(TokenId(parse_uuid(token, s)?))),
            _ => Err(CoreError::InvalidReference(s.to_string())),
        }
    }
}

impl TryFrom<String> for DocRef {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DocRef> for String {
    fn from(r: DocRef) -> String {
        r.to_string()
    }
}

/// What a reference resolved to: a combatant, or an item together with its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A combatant acting on its own.
    Entity(Entity),
    /// An item and the combatant that owns it.
    Item {
        /// The owning combatant.
        owner: Entity,
        /// The item.
        item: Item,
    },
}

impl Resolved {
    /// The acting combatant.
    pub fn actor(&self) -> &Entity {
        match self {
            Self::Entity(e) => e,
            Self::Item { owner, .. } => owner,
        }
    }

    /// The associated item, if any.
    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Entity(_) => None,
            Self::Item { item, .. } => Some(item),
        }
    }

    /// Split into the acting combatant and optional item.
    pub fn into_parts(self) -> (Entity, Option<Item>) {
        match self {
            Self::Entity(e) => (e, None),
            Self::Item { owner, item } => (owner, Some(item)),
        }
    }

    /// The reference that names this resolution.
    pub fn doc_ref(&self) -> DocRef {
        match self {
            Self::Entity(e) => DocRef::Actor(e.id),
            Self::Item { owner, item } => DocRef::owned_item(owner.id, item.id),
        }
    }
}
