use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::session::HydrateCtx;
use crate::error::{RollError, RollResult};

/// Which roll context container a plugin attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Once per roll, on the weapon container.
    PerRoll,
    /// Once per roll, on the base container (applies with no resolved target).
    PerUnknownTarget,
    /// Once per target, on that target's container.
    PerTarget,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerRoll => write!(f, "per-roll"),
            Self::PerUnknownTarget => write!(f, "per-unknown-target"),
            Self::PerTarget => write!(f, "per-target"),
        }
    }
}

/// Which kind of roll context a plugin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Attack and tech attack rolls.
    #[default]
    Attack,
    /// Damage rolls.
    Damage,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attack => write!(f, "attack"),
            Self::Damage => write!(f, "damage"),
        }
    }
}

/// How a plugin is presented for user editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiBehavior {
    /// A toggle the user can flip, overriding automation.
    #[default]
    Checkbox,
    /// Never shown.
    NoUi,
}

/// Decides whether a plugin applies to the current roll.
///
/// An `Err` demotes the plugin to inactive instead of failing the roll.
pub type Predicate = Arc<dyn Fn(&HydrateCtx<'_>) -> Result<bool, String> + Send + Sync>;

/// Rewrites a formula string.
pub type Rewrite = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// When a plugin becomes active.
#[derive(Clone)]
pub enum Activation {
    /// Requires a talent at a minimum rank; auto-activates when automation is
    /// enabled and the predicate holds. The user may override either way.
    Talent {
        /// Talent identifier on the actor.
        talent: String,
        /// Minimum rank.
        rank: u8,
        /// Automatic activation predicate.
        applies: Predicate,
    },
    /// Informational only: never affects the roll, flags a reminder instead.
    Reminder {
        /// When the reminder shows.
        applies: Predicate,
    },
    /// Active whenever the predicate holds.
    AlwaysOn {
        /// Activation predicate.
        applies: Predicate,
    },
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Talent { talent, rank, .. } => f
                .debug_struct("Talent")
                .field("talent", talent)
                .field("rank", rank)
                .finish_non_exhaustive(),
            Self::Reminder { .. } => f.debug_struct("Reminder").finish_non_exhaustive(),
            Self::AlwaysOn { .. } => f.debug_struct("AlwaysOn").finish_non_exhaustive(),
        }
    }
}

/// What an active plugin does to its roll.
#[derive(Clone, Default)]
pub struct RollEffect {
    /// Accuracy (positive) or difficulty (negative) contributed to the total.
    pub accuracy: i32,
    /// Optional formula rewrite.
    pub rewrite: Option<Rewrite>,
    /// Rewrite ordering; higher runs first.
    pub precedence: i32,
}

impl fmt::Debug for RollEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollEffect")
            .field("accuracy", &self.accuracy)
            .field("rewrite", &self.rewrite.is_some())
            .field("precedence", &self.precedence)
            .finish()
    }
}

/// The type of a persisted plugin field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `true` / `false`.
    Bool,
    /// An integer.
    Int,
    /// A string.
    Text,
}

impl FieldKind {
    fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Text => value.is_string(),
        }
    }
}

/// The fields a plugin persists beyond its user override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl PluginSchema {
    /// Declared fields.
    pub fn fields(&self) -> &BTreeMap<String, FieldKind> {
        &self.fields
    }

    /// Check persisted fields against the schema.
    pub fn validate(&self, data: &BTreeMap<String, serde_json::Value>) -> Result<(), String> {
        for (name, value) in data {
            match self.fields.get(name) {
                None => return Err(format!("unknown field '{name}'")),
                Some(kind) if !kind.accepts(value) => {
                    return Err(format!("field '{name}' should be {kind:?}, got {value}"));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// A fully assembled plugin.
#[derive(Debug)]
pub struct PluginDef {
    /// Stable identifier, used as the key in every plugin map.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Roll family the plugin belongs to.
    pub family: Family,
    /// Containers the plugin attaches to.
    pub scopes: Vec<Scope>,
    /// When the plugin applies.
    pub activation: Activation,
    /// What it does when active.
    pub effect: RollEffect,
    /// How it is presented.
    pub ui: UiBehavior,
    /// Persisted fields.
    pub schema: PluginSchema,
}

impl PluginDef {
    /// Whether the plugin attaches to the given container scope.
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Whether the plugin exposes both a per-roll and a target-level scope,
    /// which would apply it twice to the same total.
    pub fn is_multi_scoped(&self) -> bool {
        self.has_scope(Scope::PerRoll)
            && (self.has_scope(Scope::PerTarget) || self.has_scope(Scope::PerUnknownTarget))
    }

    /// Whether the plugin can never affect a roll.
    pub fn is_reminder(&self) -> bool {
        matches!(self.activation, Activation::Reminder { .. })
    }
}

/// Assembles a [`PluginDef`] from capability pieces.
#[derive(Debug)]
pub struct PluginBuilder {
    slug: String,
    name: String,
    family: Family,
    scopes: Vec<Scope>,
    activation: Option<Activation>,
    effect: RollEffect,
    ui: UiBehavior,
    schema: PluginSchema,
}

impl PluginBuilder {
    /// Start a plugin with a slug and display name.
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            family: Family::default(),
            scopes: Vec::new(),
            activation: None,
            effect: RollEffect::default(),
            ui: UiBehavior::default(),
            schema: PluginSchema::default(),
        }
    }

    /// Set the roll family.
    pub fn family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    /// Attach to a container scope. May be called more than once.
    pub fn scope(mut self, scope: Scope) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Talent-style activation.
    pub fn talent(
        mut self,
        talent: impl Into<String>,
        rank: u8,
        applies: impl Fn(&HydrateCtx<'_>) -> Result<bool, String> + Send + Sync + 'static,
    ) -> Self {
        self.activation = Some(Activation::Talent {
            talent: talent.into(),
            rank,
            applies: Arc::new(applies),
        });
        self
    }

    /// Reminder-style activation.
    pub fn reminder(
        mut self,
        applies: impl Fn(&HydrateCtx<'_>) -> Result<bool, String> + Send + Sync + 'static,
    ) -> Self {
        self.activation = Some(Activation::Reminder {
            applies: Arc::new(applies),
        });
        self
    }

    /// Always-on activation.
    pub fn always_on(
        mut self,
        applies: impl Fn(&HydrateCtx<'_>) -> Result<bool, String> + Send + Sync + 'static,
    ) -> Self {
        self.activation = Some(Activation::AlwaysOn {
            applies: Arc::new(applies),
        });
        self
    }

    /// Accuracy contributed while active.
    pub fn accuracy(mut self, accuracy: i32) -> Self {
        self.effect.accuracy = accuracy;
        self
    }

    /// Rewrite the formula while active, at the given precedence.
    pub fn rewrite(
        mut self,
        precedence: i32,
        rewrite: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.effect.rewrite = Some(Arc::new(rewrite));
        self.effect.precedence = precedence;
        self
    }

    /// Set the UI behavior.
    pub fn ui(mut self, ui: UiBehavior) -> Self {
        self.ui = ui;
        self
    }

    /// Declare a persisted field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.schema.fields.insert(name.into(), kind);
        self
    }

    /// Finish the plugin.
    pub fn build(self) -> RollResult<PluginDef> {
        if self.slug.is_empty() {
            return Err(RollError::Validation("plugin slug is empty".into()));
        }
        if self.scopes.is_empty() {
            return Err(RollError::Validation(format!(
                "plugin '{}' has no scope",
                self.slug
            )));
        }
        let activation = self.activation.ok_or_else(|| {
            RollError::Validation(format!("plugin '{}' has no activation", self.slug))
        })?;
        Ok(PluginDef {
            slug: self.slug,
            name: self.name,
            family: self.family,
            scopes: self.scopes,
            activation,
            effect: self.effect,
            ui: self.ui,
            schema: self.schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_scope_and_activation() {
        assert!(PluginBuilder::new("x", "X").always_on(|_| Ok(true)).build().is_err());
        assert!(PluginBuilder::new("x", "X").scope(Scope::PerRoll).build().is_err());
        assert!(
            PluginBuilder::new("", "X")
                .scope(Scope::PerRoll)
                .always_on(|_| Ok(true))
                .build()
                .is_err()
        );
    }

    #[test]
    fn multi_scoped_detection() {
        let def = PluginBuilder::new("both", "Both")
            .scope(Scope::PerRoll)
            .scope(Scope::PerTarget)
            .always_on(|_| Ok(true))
            .build()
            .unwrap();
        assert!(def.is_multi_scoped());

        let def = PluginBuilder::new("one", "One")
            .scope(Scope::PerTarget)
            .scope(Scope::PerUnknownTarget)
            .always_on(|_| Ok(true))
            .build()
            .unwrap();
        assert!(!def.is_multi_scoped());
    }

    #[test]
    fn schema_validation() {
        let def = PluginBuilder::new("ranged", "Ranged")
            .scope(Scope::PerTarget)
            .field("range", FieldKind::Int)
            .always_on(|_| Ok(true))
            .build()
            .unwrap();

        let mut data = BTreeMap::new();
        data.insert("range".to_string(), serde_json::json!(3));
        assert!(def.schema.validate(&data).is_ok());

        data.insert("range".to_string(), serde_json::json!("far"));
        assert!(def.schema.validate(&data).is_err());

        let mut data = BTreeMap::new();
        data.insert("color".to_string(), serde_json::json!("red"));
        assert!(def.schema.validate(&data).is_err());
    }
}
