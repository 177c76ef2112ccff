//! An in-memory encounter: combatants, tokens on scenes, and user targets.
//!
//! [`Encounter`] implements both [`EntityProvider`] and [`TargetProvider`]
//! and is what the CLI and the test suites resolve actions against. It loads
//! from a JSON file where tokens and targets name their combatants either by
//! UUID or by display name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::provider::{EntityPatch, EntityProvider, TargetProvider};
use crate::token::{Cover, SceneId, TargetHandle, Token, TokenId};

/// On-disk shape of an encounter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterFile {
    /// The active scene. A fresh one is created if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneId>,
    /// All combatants.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Token placements.
    #[serde(default)]
    pub tokens: Vec<TokenSpec>,
    /// Combatants (by name or UUID) the user has targeted.
    #[serde(default)]
    pub targets: Vec<String>,
}

/// A token placement naming its combatant by UUID or display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSpec {
    /// Token identifier; generated if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TokenId>,
    /// Combatant UUID or display name.
    pub actor: String,
    /// Scene the token sits on; defaults to the active scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneId>,
    /// Grid position.
    #[serde(default)]
    pub position: (i32, i32),
    /// Cover the token benefits from.
    #[serde(default)]
    pub cover: Cover,
}

#[derive(Debug, Default)]
struct State {
    scene: SceneId,
    entities: HashMap<EntityId, Entity>,
    order: Vec<EntityId>,
    tokens: HashMap<TokenId, Token>,
    token_order: Vec<TokenId>,
    targets: Vec<TokenId>,
}

impl State {
    fn lookup_actor(&self, key: &str) -> Option<EntityId> {
        if let Ok(uuid) = Uuid::parse_str(key) {
            let id = EntityId(uuid);
            return self.entities.contains_key(&id).then_some(id);
        }
        self.order
            .iter()
            .find(|id| {
                self.entities
                    .get(id)
                    .is_some_and(|e| e.name.eq_ignore_ascii_case(key))
            })
            .copied()
    }

    fn active_token(&self, token: TokenId) -> Option<&Token> {
        self.tokens.get(&token).filter(|t| t.scene == self.scene)
    }

    fn token_for(&self, actor: EntityId) -> Option<TokenId> {
        self.token_order
            .iter()
            .filter_map(|id| self.tokens.get(id))
            .find(|t| t.actor == actor && t.scene == self.scene)
            .map(|t| t.id)
    }
}

/// A thread-safe in-memory encounter.
#[derive(Debug, Default)]
pub struct Encounter {
    state: RwLock<State>,
}

impl Encounter {
    /// Create an empty encounter with a fresh active scene.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build an encounter from its file representation.
    pub fn from_file(file: EncounterFile) -> CoreResult<Self> {
        let encounter = Self::new();
        {
            let mut state = encounter.write();
            if let Some(scene) = file.scene {
                state.scene = scene;
            }
            for entity in file.entities {
                state.order.push(entity.id);
                state.entities.insert(entity.id, entity);
            }
            for placed in file.tokens {
                let actor = state.lookup_actor(&placed.actor).ok_or_else(|| {
                    CoreError::InvalidReference(format!("token actor '{}'", placed.actor))
                })?;
                let token = Token {
                    id: placed.id.unwrap_or_default(),
                    scene: placed.scene.unwrap_or(state.scene),
                    actor,
                    position: placed.position,
                    cover: placed.cover,
                };
                state.token_order.push(token.id);
                state.tokens.insert(token.id, token);
            }
            for name in file.targets {
                let token = state
                    .lookup_actor(&name)
                    .and_then(|actor| state.token_for(actor))
                    .ok_or_else(|| CoreError::InvalidReference(format!("target '{name}'")))?;
                state.targets.push(token);
            }
            tracing::debug!(
                entities = state.entities.len(),
                tokens = state.tokens.len(),
                "encounter loaded"
            );
        }
        Ok(encounter)
    }

    /// Parse an encounter from JSON.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Self::from_file(serde_json::from_str(json)?)
    }

    /// Load an encounter from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Snapshot the encounter into its file representation.
    pub fn to_file(&self) -> EncounterFile {
        let state = self.read();
        EncounterFile {
            scene: Some(state.scene),
            entities: state
                .order
                .iter()
                .filter_map(|id| state.entities.get(id).cloned())
                .collect(),
            tokens: state
                .token_order
                .iter()
                .filter_map(|id| state.tokens.get(id))
                .map(|t| TokenSpec {
                    id: Some(t.id),
                    actor: t.actor.0.to_string(),
                    scene: Some(t.scene),
                    position: t.position,
                    cover: t.cover,
                })
                .collect(),
            targets: state
                .targets
                .iter()
                .filter_map(|t| state.tokens.get(t))
                .map(|t| t.actor.0.to_string())
                .collect(),
        }
    }

    /// Write the encounter to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(&self.to_file())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Add a combatant.
    pub fn add_entity(&self, entity: Entity) -> EntityId {
        let id = entity.id;
        let mut state = self.write();
        if !state.entities.contains_key(&id) {
            state.order.push(id);
        }
        state.entities.insert(id, entity);
        id
    }

    /// Place a token for a combatant on the active scene.
    pub fn place(&self, actor: EntityId, position: (i32, i32)) -> CoreResult<TokenId> {
        let scene = self.active_scene();
        self.place_on(scene, actor, position)
    }

    /// Place a token for a combatant on a specific scene.
    pub fn place_on(
        &self,
        scene: SceneId,
        actor: EntityId,
        position: (i32, i32),
    ) -> CoreResult<TokenId> {
        let mut state = self.write();
        if !state.entities.contains_key(&actor) {
            return Err(CoreError::EntityNotFound(actor));
        }
        let token = Token {
            id: TokenId::new(),
            scene,
            actor,
            position,
            cover: Cover::None,
        };
        let id = token.id;
        state.token_order.push(id);
        state.tokens.insert(id, token);
        Ok(id)
    }

    /// Remove a token from its scene.
    pub fn remove_token(&self, token: TokenId) -> Option<Token> {
        let mut state = self.write();
        state.token_order.retain(|t| *t != token);
        state.targets.retain(|t| *t != token);
        state.tokens.remove(&token)
    }

    /// Set the cover a token benefits from.
    pub fn set_cover(&self, token: TokenId, cover: Cover) {
        if let Some(t) = self.write().tokens.get_mut(&token) {
            t.cover = cover;
        }
    }

    /// Replace the user's current targets.
    pub fn set_targets(&self, targets: Vec<TokenId>) {
        self.write().targets = targets;
    }

    /// The active scene.
    pub fn active_scene(&self) -> SceneId {
        self.read().scene
    }

    /// Switch the active scene.
    pub fn set_active_scene(&self, scene: SceneId) {
        self.write().scene = scene;
    }

    /// All combatants in insertion order.
    pub fn entities(&self) -> Vec<Entity> {
        let state = self.read();
        state
            .order
            .iter()
            .filter_map(|id| state.entities.get(id).cloned())
            .collect()
    }

    /// Find a combatant by UUID or case-insensitive display name.
    pub fn find(&self, key: &str) -> Option<Entity> {
        let state = self.read();
        state
            .lookup_actor(key)
            .and_then(|id| state.entities.get(&id).cloned())
    }
}

impl EntityProvider for Encounter {
    fn entity(&self, id: EntityId) -> Option<Entity> {
        self.read().entities.get(&id).cloned()
    }

    fn update(&self, id: EntityId, patch: EntityPatch) -> CoreResult<Entity> {
        let mut state = self.write();
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or(CoreError::EntityNotFound(id))?;
        patch.apply(entity)?;
        tracing::debug!(entity = %id, "entity updated");
        Ok(entity.clone())
    }

    fn token_actor(&self, token: TokenId) -> Option<EntityId> {
        self.read().active_token(token).map(|t| t.actor)
    }
}

impl TargetProvider for Encounter {
    fn target(&self, token: TokenId) -> Option<TargetHandle> {
        let state = self.read();
        let t = state.active_token(token)?;
        let entity = state.entities.get(&t.actor)?.clone();
        Some(TargetHandle {
            token: t.id,
            scene: t.scene,
            cover: t.cover,
            entity,
        })
    }

    fn distance(&self, a: TokenId, b: TokenId) -> Option<u32> {
        let state = self.read();
        let a = state.active_token(a)?;
        let b = state.active_token(b)?;
        Some(a.distance_to(b))
    }

    fn cover(&self, token: TokenId) -> Cover {
        self.read()
            .active_token(token)
            .map(|t| t.cover)
            .unwrap_or_default()
    }

    fn user_targets(&self) -> Vec<TokenId> {
        let state = self.read();
        state
            .targets
            .iter()
            .copied()
            .filter(|t| state.active_token(*t).is_some())
            .collect()
    }

    fn token_for(&self, actor: EntityId) -> Option<TokenId> {
        self.read().token_for(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Condition, EntityKind};
    use crate::item::ItemId;
    use crate::reference::{DocRef, Resolved};

    const JSON: &str = r#"{
        "entities": [
            { "name": "Atlas", "grit": 2, "defenses": { "evasion": 10 } },
            { "name": "Goblin", "kind": "npc", "disposition": "hostile", "conditions": ["prone"] }
        ],
        "tokens": [
            { "actor": "Atlas", "position": [0, 0] },
            { "actor": "goblin", "position": [2, 1], "cover": 1 }
        ],
        "targets": ["Goblin"]
    }"#;

    #[test]
    fn loads_from_json() {
        let enc = Encounter::from_json(JSON).unwrap();
        assert_eq!(enc.entities().len(), 2);
        let atlas = enc.find("atlas").unwrap();
        assert_eq!(atlas.grit, 2);
        assert_eq!(atlas.defenses.evasion, 10);

        let targets = enc.user_targets();
        assert_eq!(targets.len(), 1);
        let handle = enc.target(targets[0]).unwrap();
        assert_eq!(handle.name(), "Goblin");
        assert_eq!(handle.cover, Cover::Soft);
        assert!(handle.has_condition(Condition::Prone));
    }

    #[test]
    fn unknown_token_actor_fails() {
        let json = r#"{ "entities": [], "tokens": [{ "actor": "Nobody" }] }"#;
        assert!(matches!(
            Encounter::from_json(json),
            Err(CoreError::InvalidReference(_))
        ));
    }

    #[test]
    fn distance_between_tokens() {
        let enc = Encounter::from_json(JSON).unwrap();
        let atlas = enc.token_for(enc.find("Atlas").unwrap().id).unwrap();
        let goblin = enc.token_for(enc.find("Goblin").unwrap().id).unwrap();
        assert_eq!(enc.distance(atlas, goblin), Some(2));
    }

    #[test]
    fn token_on_inactive_scene_is_not_found() {
        let enc = Encounter::new();
        let id = enc.add_entity(Entity::new(EntityKind::Mech, "Atlas"));
        let token = enc.place_on(SceneId::new(), id, (0, 0)).unwrap();
        assert!(enc.target(token).is_none());
        assert!(matches!(
            enc.resolve(&DocRef::Token(token)),
            Err(CoreError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn token_resolves_to_its_actor() {
        let enc = Encounter::new();
        let id = enc.add_entity(Entity::new(EntityKind::Mech, "Atlas"));
        let token = enc.place(id, (1, 1)).unwrap();
        let resolved = enc.resolve(&DocRef::Token(token)).unwrap();
        assert!(matches!(resolved, Resolved::Entity(e) if e.id == id));
    }

    #[test]
    fn unowned_item_is_invalid() {
        let enc = Encounter::new();
        assert!(matches!(
            enc.resolve(&DocRef::Item(ItemId::new())),
            Err(CoreError::InvalidReference(_))
        ));
    }

    #[test]
    fn update_persists() {
        let enc = Encounter::new();
        let id = enc.add_entity(Entity::new(EntityKind::Mech, "Atlas"));
        let patch = EntityPatch {
            heat: Some(4),
            ..EntityPatch::default()
        };
        let updated = enc.update(id, patch).unwrap();
        assert_eq!(updated.heat.value, 4);
        assert_eq!(enc.entity(id).unwrap().heat.value, 4);
    }

    #[test]
    fn update_missing_entity_fails() {
        let enc = Encounter::new();
        assert!(matches!(
            enc.update(EntityId::new(), EntityPatch::default()),
            Err(CoreError::EntityNotFound(_))
        ));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encounter.json");
        let enc = Encounter::from_json(JSON).unwrap();
        enc.save(&path).unwrap();

        let reloaded = Encounter::load(&path).unwrap();
        assert_eq!(reloaded.active_scene(), enc.active_scene());
        assert_eq!(reloaded.user_targets(), enc.user_targets());
        assert_eq!(reloaded.find("Goblin"), enc.find("Goblin"));
    }
}
