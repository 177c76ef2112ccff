//! The presentation sink flows hand their results to.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sk_core::{Entity, EntityId};

use crate::flow::SerializedFlow;

/// Which card a message renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// Weapon or basic attack.
    Attack,
    /// Tech attack.
    TechAttack,
    /// Damage roll.
    Damage,
    /// Stat check.
    Stat,
    /// Structure damage table.
    Structure,
    /// Overheat table.
    Overheat,
    /// System trauma result.
    SystemTrauma,
    /// System activation.
    Activation,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Attack => "attack",
            Self::TechAttack => "tech_attack",
            Self::Damage => "damage",
            Self::Stat => "stat",
            Self::Structure => "structure",
            Self::Overheat => "overheat",
            Self::SystemTrauma => "system_trauma",
            Self::Activation => "activation",
        };
        f.write_str(name)
    }
}

/// Flows attached to a rendered message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFlags {
    /// Re-run the same flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reroll: Option<SerializedFlow>,
    /// A flow the result leads into, such as rolling damage after a hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<SerializedFlow>,
}

/// One rendered result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The acting combatant.
    pub actor: EntityId,
    /// Display name of the actor.
    pub speaker: String,
    /// Card template.
    pub template: Template,
    /// Template data: the flow payload.
    pub data: serde_json::Value,
    /// Attached flows.
    #[serde(default)]
    pub flags: ChatFlags,
}

/// Where results and warnings go. Flows never read anything back.
pub trait ChatSink: Send + Sync {
    /// Show a result.
    fn render(&self, message: ChatMessage);

    /// Show a user-facing warning, e.g. a failed precondition.
    fn warn(&self, actor: &Entity, text: &str);
}

/// A sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryChat {
    messages: Mutex<Vec<ChatMessage>>,
    warnings: Mutex<Vec<String>>,
}

impl MemoryChat {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every rendered message, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<ChatMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Every warning, oldest first.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChatSink for MemoryChat {
    fn render(&self, message: ChatMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    fn warn(&self, actor: &Entity, text: &str) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{}: {text}", actor.name));
    }
}
