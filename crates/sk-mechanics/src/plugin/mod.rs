//! Roll plugins: independently authored situational modifiers.
//!
//! A plugin is assembled from capability pieces with [`PluginBuilder`]:
//! an [`Activation`] deciding when it applies, a [`RollEffect`] describing
//! what it does to the roll, a [`UiBehavior`], and a schema for the fields it
//! persists. Plugins join an explicit [`PluginRegistry`], which attaches a
//! [`PluginInstance`] per plugin to every matching roll context container.
//!
//! Instances have two phases. The persisted half ([`PluginData`]) is what
//! round-trips through serialization. The live half ([`PluginState`]) only
//! exists after [`PluginInstance::hydrate`], and every derived accessor fails
//! with [`RollError::NotHydrated`](crate::RollError::NotHydrated) before it.

mod def;
mod instance;
mod registry;
mod session;

pub use def::{
    Activation, FieldKind, Family, PluginBuilder, PluginDef, PluginSchema, Predicate, Rewrite,
    RollEffect, Scope, UiBehavior,
};
pub(crate) use instance::compose;
pub use instance::{PluginData, PluginInstance, PluginMap, PluginState};
pub use registry::PluginRegistry;
pub use session::{HydrateCtx, RollSession};
