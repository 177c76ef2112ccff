//! Collaborator traits the action engine consumes.
//!
//! The engine never owns combatants or scenes. It reads them through an
//! [`EntityProvider`] and a [`TargetProvider`] and writes back through
//! partial [`EntityPatch`] updates. Last write wins: there is no locking or
//! optimistic-concurrency discipline at this seam.

use crate::entity::{Condition, Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::item::ItemId;
use crate::reference::{DocRef, Resolved};
use crate::token::{Cover, TargetHandle, TokenId};

/// A partial update to one owned item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    /// The item to update.
    pub id: ItemId,
    /// New loaded state.
    pub loaded: Option<bool>,
    /// New remaining uses.
    pub uses: Option<i32>,
    /// New destroyed state.
    pub destroyed: Option<bool>,
}

impl ItemPatch {
    /// An empty patch for the given item.
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// A partial update to a combatant. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    /// New HP value.
    pub hp: Option<i32>,
    /// New structure value.
    pub structure: Option<i32>,
    /// New stress value.
    pub stress: Option<i32>,
    /// New heat value.
    pub heat: Option<i32>,
    /// Conditions to add.
    pub add_conditions: Vec<Condition>,
    /// Conditions to remove.
    pub remove_conditions: Vec<Condition>,
    /// Item updates.
    pub items: Vec<ItemPatch>,
}

impl EntityPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the patch to a combatant in place.
    pub fn apply(&self, entity: &mut Entity) -> CoreResult<()> {
        if let Some(v) = self.hp {
            entity.hp.set(v);
        }
        if let Some(v) = self.structure {
            entity.structure.set(v);
        }
        if let Some(v) = self.stress {
            entity.stress.set(v);
        }
        if let Some(v) = self.heat {
            entity.heat.set(v);
        }
        for c in &self.add_conditions {
            entity.conditions.insert(*c);
        }
        for c in &self.remove_conditions {
            entity.conditions.remove(c);
        }
        let owner = entity.id;
        for patch in &self.items {
            let item = entity.item_mut(patch.id).ok_or(CoreError::ItemNotFound {
                entity: owner,
                item: patch.id,
            })?;
            if let Some(loaded) = patch.loaded {
                item.loaded = loaded;
            }
            if let (Some(uses), Some(track)) = (patch.uses, item.uses.as_mut()) {
                track.set(uses);
            }
            if let Some(destroyed) = patch.destroyed {
                item.destroyed = destroyed;
            }
        }
        Ok(())
    }
}

/// Resolves references to combatants and items and persists updates.
pub trait EntityProvider: Send + Sync {
    /// Fetch a snapshot of a combatant.
    fn entity(&self, id: EntityId) -> Option<Entity>;

    /// Apply a partial update and return the updated snapshot.
    fn update(&self, id: EntityId, patch: EntityPatch) -> CoreResult<Entity>;

    /// The combatant a token represents, if the token is live.
    fn token_actor(&self, token: TokenId) -> Option<EntityId>;

    /// Resolve a reference to exactly one combatant, or one item with its owner.
    ///
    /// Fails with [`CoreError::InvalidReference`] for unowned items and with
    /// [`CoreError::ReferenceNotFound`] when the referenced document is gone.
    fn resolve(&self, reference: &DocRef) -> CoreResult<Resolved> {
        match *reference {
            DocRef::Actor(id) => self
                .entity(id)
                .map(Resolved::Entity)
                .ok_or_else(|| CoreError::ReferenceNotFound(reference.to_string())),
            DocRef::OwnedItem { actor, item } => {
                let owner = self
                    .entity(actor)
                    .ok_or_else(|| CoreError::ReferenceNotFound(reference.to_string()))?;
                let item = owner
                    .item(item)
                    .cloned()
                    .ok_or_else(|| CoreError::ReferenceNotFound(reference.to_string()))?;
                Ok(Resolved::Item { owner, item })
            }
            DocRef::Item(_) => Err(CoreError::InvalidReference(format!(
                "{reference} is an item without an owner"
            ))),
            DocRef::Token(token) => {
                let actor = self
                    .token_actor(token)
                    .ok_or_else(|| CoreError::ReferenceNotFound(reference.to_string()))?;
                self.entity(actor)
                    .map(Resolved::Entity)
                    .ok_or_else(|| CoreError::ReferenceNotFound(reference.to_string()))
            }
        }
    }
}

/// Live scene state: tokens, distances, cover, and the user's current targets.
pub trait TargetProvider: Send + Sync {
    /// Resolve a token on the active scene into a live handle.
    ///
    /// Returns `None` if the token is gone or belongs to another scene.
    fn target(&self, token: TokenId) -> Option<TargetHandle>;

    /// Grid distance between two tokens on the active scene.
    fn distance(&self, a: TokenId, b: TokenId) -> Option<u32>;

    /// Cover the token currently benefits from.
    fn cover(&self, token: TokenId) -> Cover;

    /// Tokens the user currently has targeted.
    fn user_targets(&self) -> Vec<TokenId>;

    /// The active-scene token representing a combatant, if any.
    fn token_for(&self, actor: EntityId) -> Option<TokenId>;
}
