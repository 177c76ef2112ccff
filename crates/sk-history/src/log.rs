//! The history log: rounds of turns of actions.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sk_core::EntityId;

use crate::error::{HistoryError, HistoryResult};
use crate::record::ActionRecord;

/// A history log shared between flows and plugin hydration.
pub type SharedHistory = Arc<RwLock<ActionHistory>>;

/// One combatant's turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The acting combatant.
    pub actor: EntityId,
    /// Actions resolved during the turn, oldest first.
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}

impl Turn {
    /// Start an empty turn for a combatant.
    pub fn new(actor: EntityId) -> Self {
        Self {
            actor,
            actions: Vec::new(),
        }
    }
}

/// One round of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Turns in the order they started.
    #[serde(default)]
    pub turns: Vec<Turn>,
}

/// Append-only record of rounds, turns, and actions for one session.
///
/// Rounds and turns are only removed by undoing the transition that created
/// them. Action records are never mutated once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionHistory {
    rounds: Vec<Round>,
}

impl ActionHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history wrapped for sharing.
    pub fn shared() -> SharedHistory {
        Arc::new(RwLock::new(Self::new()))
    }

    /// All rounds, oldest first.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// The 1-based number of the current round, or 0 before the first.
    pub fn round_number(&self) -> usize {
        self.rounds.len()
    }

    /// The current round, if any.
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Start a new round. Returns its number.
    pub fn start_round(&mut self) -> usize {
        self.rounds.push(Round::default());
        tracing::info!(round = self.rounds.len(), "round started");
        self.rounds.len()
    }

    /// Undo the most recent round start, discarding everything recorded in it.
    pub fn undo_round(&mut self) -> Option<Round> {
        let round = self.rounds.pop();
        if round.is_some() {
            tracing::info!(round = self.rounds.len() + 1, "round undone");
        }
        round
    }

    /// Start a turn for a combatant in the current round.
    pub fn start_turn(&mut self, actor: EntityId) -> HistoryResult<()> {
        let round = self.rounds.last_mut().ok_or(HistoryError::NoActiveRound)?;
        round.turns.push(Turn::new(actor));
        tracing::info!(actor = %actor, "turn started");
        Ok(())
    }

    /// Undo every turn the combatant started in the current round.
    ///
    /// Other combatants' turns are untouched. Returns how many turns were removed.
    pub fn undo_turn(&mut self, actor: EntityId) -> usize {
        let Some(round) = self.rounds.last_mut() else {
            return 0;
        };
        let before = round.turns.len();
        round.turns.retain(|t| t.actor != actor);
        let removed = before - round.turns.len();
        if removed > 0 {
            tracing::info!(actor = %actor, removed, "turn undone");
        }
        removed
    }

    /// Append an action to the combatant's latest turn in the current round.
    pub fn record(&mut self, actor: EntityId, action: ActionRecord) -> HistoryResult<()> {
        let turn = self
            .rounds
            .last_mut()
            .and_then(|r| r.turns.iter_mut().rev().find(|t| t.actor == actor))
            .ok_or(HistoryError::NoActiveTurn(actor))?;
        tracing::debug!(actor = %actor, kind = ?action.kind, "action recorded");
        turn.actions.push(action);
        Ok(())
    }

    /// Every action the combatant resolved, most recent first, across all rounds.
    pub fn actions_for(&self, actor: EntityId) -> Vec<&ActionRecord> {
        self.rounds
            .iter()
            .rev()
            .flat_map(|r| r.turns.iter().rev())
            .filter(|t| t.actor == actor)
            .flat_map(|t| t.actions.iter().rev())
            .collect()
    }

    /// Actions in the combatant's latest turn of the current round, oldest first.
    pub fn current_turn_actions(&self, actor: EntityId) -> Vec<&ActionRecord> {
        self.rounds
            .last()
            .and_then(|r| r.turns.iter().rev().find(|t| t.actor == actor))
            .map(|t| t.actions.iter().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ActionKind;
    use sk_core::ItemId;

    fn record(kind: ActionKind) -> ActionRecord {
        ActionRecord::new(kind)
    }

    #[test]
    fn turn_requires_round() {
        let mut h = ActionHistory::new();
        assert!(matches!(
            h.start_turn(EntityId::new()),
            Err(HistoryError::NoActiveRound)
        ));
    }

    #[test]
    fn record_requires_turn() {
        let mut h = ActionHistory::new();
        h.start_round();
        let actor = EntityId::new();
        assert!(matches!(
            h.record(actor, record(ActionKind::Attack)),
            Err(HistoryError::NoActiveTurn(id)) if id == actor
        ));
    }

    #[test]
    fn round_numbers() {
        let mut h = ActionHistory::new();
        assert_eq!(h.round_number(), 0);
        assert_eq!(h.start_round(), 1);
        assert_eq!(h.start_round(), 2);
        assert!(h.undo_round().is_some());
        assert_eq!(h.round_number(), 1);
    }

    #[test]
    fn undo_turn_only_removes_that_actor_in_current_round() {
        let x = EntityId::new();
        let y = EntityId::new();
        let mut h = ActionHistory::new();

        h.start_round();
        h.start_turn(x).unwrap();
        h.record(x, record(ActionKind::Attack)).unwrap();

        h.start_round();
        h.start_turn(x).unwrap();
        h.start_turn(y).unwrap();
        h.record(y, record(ActionKind::Stat)).unwrap();
        h.start_turn(x).unwrap();
        h.record(x, record(ActionKind::Attack)).unwrap();

        assert_eq!(h.undo_turn(x), 2);

        let current = h.current_round().unwrap();
        assert_eq!(current.turns.len(), 1);
        assert_eq!(current.turns[0].actor, y);
        assert_eq!(h.current_turn_actions(y).len(), 1);
        assert_eq!(h.rounds()[0].turns.len(), 1);
        assert_eq!(h.actions_for(x).len(), 1);
    }

    #[test]
    fn actions_for_is_most_recent_first() {
        let actor = EntityId::new();
        let first = ItemId::new();
        let second = ItemId::new();
        let third = ItemId::new();
        let mut h = ActionHistory::new();

        h.start_round();
        h.start_turn(actor).unwrap();
        let mut a = record(ActionKind::Attack);
        a.item = Some(first);
        h.record(actor, a).unwrap();
        let mut b = record(ActionKind::Attack);
        b.item = Some(second);
        h.record(actor, b).unwrap();

        h.start_round();
        h.start_turn(actor).unwrap();
        let mut c = record(ActionKind::Attack);
        c.item = Some(third);
        h.record(actor, c).unwrap();

        let items: Vec<_> = h.actions_for(actor).iter().map(|a| a.item).collect();
        assert_eq!(items, vec![Some(third), Some(second), Some(first)]);
        assert_eq!(h.current_turn_actions(actor).len(), 1);
    }

    #[test]
    fn current_turn_actions_empty_without_turn() {
        let h = ActionHistory::new();
        assert!(h.current_turn_actions(EntityId::new()).is_empty());
    }

    #[test]
    fn serde_roundtrip_preserves_log() {
        let actor = EntityId::new();
        let mut h = ActionHistory::new();
        h.start_round();
        h.start_turn(actor).unwrap();
        h.record(actor, record(ActionKind::Overheat)).unwrap();

        let json = serde_json::to_string(&h).unwrap();
        let back: ActionHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
