//! Action resolution flows for Skirmish.
//!
//! A flow resolves one game action as an ordered sequence of named steps
//! over a mutable state. Steps can be spliced into a flow kind's base
//! sequence (affecting every later flow of that kind) or into a single
//! instance. A step returning `false` aborts the flow cleanly; an error
//! aborts it with that error. Flows nest, serialize for rerolls, and share
//! one set of [`FlowServices`].

/// Chat cards and the sink that renders them.
pub mod chat;
/// Flow error types.
pub mod error;
/// Flow kinds and running flows.
pub mod flow;
/// The built-in flow kinds.
pub mod flows;
/// The modifier editing surface.
pub mod hud;
/// Registered flow kinds and their base sequences.
pub mod registry;
/// Services shared by every flow.
pub mod services;
/// Per-flow mutable state.
pub mod state;
/// Steps and step sequences.
pub mod step;
/// Steps shared by several flow kinds.
pub mod steps;

pub use chat::{ChatFlags, ChatMessage, ChatSink, MemoryChat, Template};
pub use error::{FlowError, FlowResult};
pub use flow::{DynFlow, Flow, FlowKind, SerializedFlow, SubFlow};
pub use hud::{HudAnswer, HudError, HudRequest, HudSurface};
pub use registry::FlowRegistry;
pub use services::{FlowServices, FlowServicesBuilder};
pub use state::FlowState;
pub use step::{FnStep, NestedFlow, Step, StepRef, StepSequence};
