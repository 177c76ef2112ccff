//! The modifier-editing surface.
//!
//! At most one request is pending at a time. A new context request replaces
//! the pending one and the replaced caller observes cancellation. A bare
//! target request is refused while anything is pending. A pending context
//! request can also be answered with a retarget, which keeps the roll open.

use std::sync::{Mutex, PoisonError};

use sk_core::TokenId;
use tokio::sync::{Notify, oneshot};

/// Why a HUD request did not produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HudError {
    /// The user closed the HUD or a newer request replaced this one.
    #[error("hud request cancelled")]
    Cancelled,
    /// Another request is already pending.
    #[error("hud is busy with another request")]
    Busy,
    /// The answer does not match the pending request.
    #[error("answer does not match the pending request")]
    Mismatch,
}

/// What the HUD is currently asking the user for.
#[derive(Debug, Clone, PartialEq)]
pub enum HudRequest {
    /// Edit a full roll context.
    Context {
        /// Roll title.
        title: String,
        /// The encoded roll context.
        context: serde_json::Value,
    },
    /// Pick targets.
    Targets {
        /// Suggested targets.
        candidates: Vec<TokenId>,
    },
}

/// The user's answer to a pending request.
#[derive(Debug, Clone, PartialEq)]
pub enum HudAnswer {
    /// The edited roll context.
    Context(serde_json::Value),
    /// The chosen targets.
    Targets(Vec<TokenId>),
    /// The context edited so far, to be moved onto a new target list.
    Retarget {
        /// The encoded roll context.
        context: serde_json::Value,
        /// The new targets.
        targets: Vec<TokenId>,
    },
}

struct Pending {
    request: HudRequest,
    reply: oneshot::Sender<HudAnswer>,
}

/// A single-slot prompt shared between flows and the UI.
#[derive(Default)]
pub struct HudSurface {
    slot: Mutex<Option<Pending>>,
    opened: Notify,
}

impl std::fmt::Debug for HudSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HudSurface")
            .field("pending", &self.pending())
            .finish()
    }
}

impl HudSurface {
    /// An idle surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the user to edit a roll context and wait for the answer: either
    /// the edited context or a retarget.
    pub async fn edit_context(
        &self,
        title: impl Into<String>,
        context: serde_json::Value,
    ) -> Result<HudAnswer, HudError> {
        let request = HudRequest::Context {
            title: title.into(),
            context,
        };
        let rx = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.take().is_some() {
                tracing::debug!("hud request replaced");
            }
            let (tx, rx) = oneshot::channel();
            *slot = Some(Pending { request, reply: tx });
            rx
        };
        self.opened.notify_one();
        rx.await.map_err(|_| HudError::Cancelled)
    }

    /// Ask the user to pick targets. Refused while another request is pending.
    pub async fn pick_targets(&self, candidates: Vec<TokenId>) -> Result<Vec<TokenId>, HudError> {
        let rx = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(HudError::Busy);
            }
            let (tx, rx) = oneshot::channel();
            *slot = Some(Pending {
                request: HudRequest::Targets { candidates },
                reply: tx,
            });
            rx
        };
        self.opened.notify_one();
        match rx.await {
            Ok(HudAnswer::Targets(tokens)) => Ok(tokens),
            Ok(HudAnswer::Context(_) | HudAnswer::Retarget { .. }) => Err(HudError::Mismatch),
            Err(_) => Err(HudError::Cancelled),
        }
    }

    /// The pending request, if any.
    pub fn pending(&self) -> Option<HudRequest> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.request.clone())
    }

    /// Wait until a request is pending and return it.
    pub async fn next_request(&self) -> HudRequest {
        loop {
            let opened = self.opened.notified();
            if let Some(request) = self.pending() {
                return request;
            }
            opened.await;
        }
    }

    /// Answer the pending request. A target request takes targets; a context
    /// request takes a context or a retarget.
    pub fn submit(&self, answer: HudAnswer) -> Result<(), HudError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let matches = match (slot.as_ref().map(|p| &p.request), &answer) {
            (None, _) => return Err(HudError::Cancelled),
            (
                Some(HudRequest::Context { .. }),
                HudAnswer::Context(_) | HudAnswer::Retarget { .. },
            )
            | (Some(HudRequest::Targets { .. }), HudAnswer::Targets(_)) => true,
            _ => false,
        };
        if !matches {
            return Err(HudError::Mismatch);
        }
        let Some(pending) = slot.take() else {
            return Err(HudError::Cancelled);
        };
        pending.reply.send(answer).map_err(|_| HudError::Cancelled)
    }

    /// Close the pending request. Returns whether anything was pending.
    pub fn cancel(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn submit_resolves_pending_request() {
        let hud = Arc::new(HudSurface::new());
        let waiter = {
            let hud = Arc::clone(&hud);
            tokio::spawn(async move { hud.edit_context("Attack", serde_json::json!({"a": 1})).await })
        };
        let request = hud.next_request().await;
        assert!(matches!(request, HudRequest::Context { ref title, .. } if title == "Attack"));
        hud.submit(HudAnswer::Context(serde_json::json!({"a": 2})))
            .unwrap();
        assert_eq!(
            waiter.await.unwrap(),
            Ok(HudAnswer::Context(serde_json::json!({"a": 2})))
        );
        assert!(hud.pending().is_none());
    }

    #[tokio::test]
    async fn context_request_accepts_a_retarget() {
        let hud = Arc::new(HudSurface::new());
        let waiter = {
            let hud = Arc::clone(&hud);
            tokio::spawn(async move { hud.edit_context("Attack", serde_json::json!({})).await })
        };
        hud.next_request().await;
        assert_eq!(
            hud.submit(HudAnswer::Targets(Vec::new())),
            Err(HudError::Mismatch)
        );
        let retarget = HudAnswer::Retarget {
            context: serde_json::json!({"a": 1}),
            targets: vec![TokenId::new()],
        };
        hud.submit(retarget.clone()).unwrap();
        assert_eq!(waiter.await.unwrap(), Ok(retarget));
    }

    #[tokio::test]
    async fn target_request_rejects_a_context() {
        let hud = Arc::new(HudSurface::new());
        let waiter = {
            let hud = Arc::clone(&hud);
            tokio::spawn(async move { hud.pick_targets(Vec::new()).await })
        };
        hud.next_request().await;
        assert_eq!(
            hud.submit(HudAnswer::Context(serde_json::json!({}))),
            Err(HudError::Mismatch)
        );
        hud.submit(HudAnswer::Targets(Vec::new())).unwrap();
        assert_eq!(waiter.await.unwrap(), Ok(Vec::new()));
    }

    #[tokio::test]
    async fn context_request_replaces_pending_one() {
        let hud = Arc::new(HudSurface::new());
        let first = {
            let hud = Arc::clone(&hud);
            tokio::spawn(async move { hud.edit_context("First", serde_json::json!(1)).await })
        };
        hud.next_request().await;

        let second = {
            let hud = Arc::clone(&hud);
            tokio::spawn(async move { hud.edit_context("Second", serde_json::json!(2)).await })
        };
        assert_eq!(first.await.unwrap(), Err(HudError::Cancelled));

        while !matches!(
            hud.pending(),
            Some(HudRequest::Context { ref title, .. }) if title == "Second"
        ) {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            hud.pick_targets(vec![TokenId::new()]).await,
            Err(HudError::Busy)
        );
        assert!(hud.cancel());
        assert_eq!(second.await.unwrap(), Err(HudError::Cancelled));
        assert!(!hud.cancel());
    }
}
