use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{FlowError, FlowResult};
use crate::services::FlowServices;
use crate::state::FlowState;

/// One unit of work in a flow.
///
/// Returning `Ok(false)` aborts the flow cleanly: a failed precondition or a
/// cancelled prompt. `Err` is reserved for fatal errors. A step may await for
/// as long as it likes.
#[async_trait]
pub trait Step<P: Send>: Send + Sync {
    /// Run the step against the shared state.
    async fn run(&self, state: &mut FlowState<P>, services: &Arc<FlowServices>)
    -> FlowResult<bool>;
}

/// A flow run as a single step of another flow.
#[async_trait]
pub trait NestedFlow<P: Send>: Send + Sync {
    /// Name of the nested flow kind.
    fn name(&self) -> &str;

    /// Run the nested flow for the parent's actor.
    async fn run(&self, parent: &mut FlowState<P>, services: &Arc<FlowServices>)
    -> FlowResult<bool>;
}

/// A synchronous closure used as a step.
pub struct FnStep<F>(F);

#[async_trait]
impl<P, F> Step<P> for FnStep<F>
where
    P: Send,
    F: Fn(&mut FlowState<P>, &FlowServices) -> FlowResult<bool> + Send + Sync,
{
    async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        (self.0)(state, services.as_ref())
    }
}

/// An entry in a step sequence.
pub enum StepRef<P: Send> {
    /// A plain step.
    Step(Arc<dyn Step<P>>),
    /// A nested flow.
    Flow(Arc<dyn NestedFlow<P>>),
}

impl<P: Send> StepRef<P> {
    /// Wrap a step.
    pub fn step(step: impl Step<P> + 'static) -> Self {
        Self::Step(Arc::new(step))
    }

    /// Wrap a nested flow.
    pub fn flow(flow: impl NestedFlow<P> + 'static) -> Self {
        Self::Flow(Arc::new(flow))
    }

    /// Wrap a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        P: 'static,
        F: Fn(&mut FlowState<P>, &FlowServices) -> FlowResult<bool> + Send + Sync + 'static,
    {
        Self::Step(Arc::new(FnStep(f)))
    }

    async fn run(&self, state: &mut FlowState<P>, services: &Arc<FlowServices>) -> FlowResult<bool> {
        match self {
            Self::Step(step) => step.run(state, services).await,
            Self::Flow(flow) => flow.run(state, services).await,
        }
    }
}

impl<P: Send> Clone for StepRef<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Step(s) => Self::Step(Arc::clone(s)),
            Self::Flow(f) => Self::Flow(Arc::clone(f)),
        }
    }
}

impl<P: Send> fmt::Debug for StepRef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(_) => f.write_str("Step"),
            Self::Flow(flow) => write!(f, "Flow({})", flow.name()),
        }
    }
}

/// An ordered, keyed list of steps.
pub struct StepSequence<P: Send> {
    entries: Vec<(String, StepRef<P>)>,
}

impl<P: Send> Default for StepSequence<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<P: Send> Clone for StepSequence<P> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<P: Send> fmt::Debug for StepSequence<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

impl<P: Send> StepSequence<P> {
    /// An empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StepSequence::push`]. A duplicate key replaces the
    /// earlier entry in place.
    pub fn with(mut self, key: impl Into<String>, step: StepRef<P>) -> Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = step,
            None => self.entries.push((key, step)),
        }
        self
    }

    /// Append a step.
    pub fn push(&mut self, key: impl Into<String>, step: StepRef<P>) -> FlowResult<()> {
        let key = key.into();
        self.ensure_absent(&key)?;
        self.entries.push((key, step));
        Ok(())
    }

    /// Insert a step immediately before `anchor`.
    pub fn insert_before(
        &mut self,
        anchor: &str,
        key: impl Into<String>,
        step: StepRef<P>,
    ) -> FlowResult<()> {
        let key = key.into();
        self.ensure_absent(&key)?;
        let idx = self.position(anchor)?;
        self.entries.insert(idx, (key, step));
        Ok(())
    }

    /// Insert a step immediately after `anchor`.
    pub fn insert_after(
        &mut self,
        anchor: &str,
        key: impl Into<String>,
        step: StepRef<P>,
    ) -> FlowResult<()> {
        let key = key.into();
        self.ensure_absent(&key)?;
        let idx = self.position(anchor)?;
        self.entries.insert(idx + 1, (key, step));
        Ok(())
    }

    /// Remove a step by key.
    pub fn remove(&mut self, key: &str) -> FlowResult<StepRef<P>> {
        let idx = self.position(key)?;
        Ok(self.entries.remove(idx).1)
    }

    /// Whether a step with the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Step keys in execution order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> FlowResult<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k == key)
            .ok_or_else(|| FlowError::StepNotFound(key.to_string()))
    }

    fn ensure_absent(&self, key: &str) -> FlowResult<()> {
        if self.contains(key) {
            Err(FlowError::DuplicateStep(key.to_string()))
        } else {
            Ok(())
        }
    }

    /// Run every step in order, stopping at the first that returns `false`.
    pub(crate) async fn run(
        &self,
        state: &mut FlowState<P>,
        services: &Arc<FlowServices>,
    ) -> FlowResult<bool> {
        for (key, step) in &self.entries {
            tracing::debug!(flow = %state.name, step = %key, "running step");
            if !step.run(state, services).await? {
                tracing::debug!(flow = %state.name, step = %key, "flow aborted");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> StepRef<()> {
        StepRef::from_fn(|_, _| Ok(true))
    }

    fn keys(seq: &StepSequence<()>) -> Vec<&str> {
        seq.keys().collect()
    }

    #[test]
    fn splicing_by_key() {
        let mut seq = StepSequence::new().with("a", noop()).with("c", noop());
        seq.insert_before("c", "b", noop()).unwrap();
        seq.insert_after("c", "d", noop()).unwrap();
        assert_eq!(keys(&seq), vec!["a", "b", "c", "d"]);

        seq.remove("a").unwrap();
        assert_eq!(keys(&seq), vec!["b", "c", "d"]);
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn splicing_errors() {
        let mut seq = StepSequence::new().with("a", noop());
        assert!(matches!(
            seq.insert_after("missing", "b", noop()),
            Err(FlowError::StepNotFound(_))
        ));
        assert!(matches!(
            seq.push("a", noop()),
            Err(FlowError::DuplicateStep(_))
        ));
        assert!(matches!(seq.remove("b"), Err(FlowError::StepNotFound(_))));
        assert_eq!(keys(&seq), vec!["a"]);
    }
}
