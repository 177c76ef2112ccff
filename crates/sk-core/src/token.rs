use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Condition, Entity, EntityId};

/// Unique identifier for a token placed on a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub Uuid);

impl TokenId {
    /// Generate a new random token ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub Uuid);

impl SceneId {
    /// Generate a new random scene ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

/// Cover between an attacker and a target.
///
/// Serialized as its numeric value (`0`, `1`, `2`), which is also the
/// accuracy penalty it imposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cover {
    /// No cover.
    #[default]
    None = 0,
    /// Soft cover: +1 difficulty.
    Soft = 1,
    /// Hard cover: +2 difficulty.
    Hard = 2,
}

impl Cover {
    /// The accuracy penalty this cover imposes.
    pub fn penalty(self) -> i32 {
        self as i32
    }
}

impl From<Cover> for u8 {
    fn from(c: Cover) -> u8 {
        c as u8
    }
}

impl TryFrom<u8> for Cover {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Soft),
            2 => Ok(Self::Hard),
            other => Err(format!("invalid cover value {other}, expected 0, 1 or 2")),
        }
    }
}

impl fmt::Display for Cover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "No Cover"),
            Self::Soft => write!(f, "Soft Cover"),
            Self::Hard => write!(f, "Hard Cover"),
        }
    }
}

/// A combatant's presence on a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Unique identifier.
    #[serde(default)]
    pub id: TokenId,
    /// The scene this token is placed on.
    pub scene: SceneId,
    /// The combatant this token represents.
    pub actor: EntityId,
    /// Grid position.
    #[serde(default)]
    pub position: (i32, i32),
    /// Cover this token currently benefits from.
    #[serde(default)]
    pub cover: Cover,
}

impl Token {
    /// Grid distance to another token (Chebyshev metric).
    pub fn distance_to(&self, other: &Token) -> u32 {
        let dx = (self.position.0 - other.position.0).unsigned_abs();
        let dy = (self.position.1 - other.position.1).unsigned_abs();
        dx.max(dy)
    }
}

/// A live, resolved reference to a targeted token and its combatant.
///
/// Handles are snapshots taken at resolution time and are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetHandle {
    /// The targeted token.
    pub token: TokenId,
    /// The scene the token was resolved on.
    pub scene: SceneId,
    /// Cover state at resolution time.
    pub cover: Cover,
    /// Snapshot of the owning combatant.
    pub entity: Entity,
}

impl TargetHandle {
    /// Whether the targeted combatant has the given condition.
    pub fn has_condition(&self, condition: Condition) -> bool {
        self.entity.has_condition(condition)
    }

    /// Display name of the targeted combatant.
    pub fn name(&self) -> &str {
        &self.entity.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Cover::Hard).unwrap(), "2");
        let c: Cover = serde_json::from_str("1").unwrap();
        assert_eq!(c, Cover::Soft);
        assert!(serde_json::from_str::<Cover>("3").is_err());
    }

    #[test]
    fn cover_penalty_matches_value() {
        assert_eq!(Cover::None.penalty(), 0);
        assert_eq!(Cover::Soft.penalty(), 1);
        assert_eq!(Cover::Hard.penalty(), 2);
    }

    #[test]
    fn chebyshev_distance() {
        let scene = SceneId::new();
        let a = Token {
            id: TokenId::new(),
            scene,
            actor: EntityId::new(),
            position: (0, 0),
            cover: Cover::None,
        };
        let mut b = a.clone();
        b.position = (3, -5);
        assert_eq!(a.distance_to(&b), 5);
    }
}
