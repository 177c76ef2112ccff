//! The roll evaluator interface and the seeded reference evaluator.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sk_core::AutomationConfig;

use super::formula::{Formula, Keep, Term};
use super::roll::{DieResult, Roll, TermRoll};
use super::Die;
use crate::error::{RollError, RollResult};

/// Evaluates dice formulas.
pub trait RollEvaluator: Send + Sync {
    /// Parse and roll a formula.
    fn evaluate(&self, formula: &str) -> RollResult<Roll>;
}

/// Reference evaluator backed by a seeded [`StdRng`].
///
/// Faces can be queued ahead of time with [`DiceEvaluator::queue`]; queued
/// faces are consumed before the RNG is consulted, clamped to the die size.
#[derive(Debug)]
pub struct DiceEvaluator {
    rng: Mutex<StdRng>,
    script: Mutex<VecDeque<u32>>,
}

impl DiceEvaluator {
    /// Create an evaluator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Create an evaluator seeded from the automation config.
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self::new(config.seed)
    }

    /// Create an evaluator that returns the given faces first.
    pub fn scripted(faces: impl IntoIterator<Item = u32>) -> Self {
        let eval = Self::new(0);
        eval.queue(faces);
        eval
    }

    /// Queue faces to be returned before any random ones.
    pub fn queue(&self, faces: impl IntoIterator<Item = u32>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(faces);
    }

    fn face(&self, die: Die) -> u32 {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(v) => v.clamp(1, die.sides()),
            None => self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_range(1..=die.sides()),
        }
    }

    /// Roll an already parsed formula.
    ///
    /// Fails with [`RollError::InvalidFormula`] when a term or the total does
    /// not fit in an `i32`.
    pub fn roll(&self, formula: &Formula) -> RollResult<Roll> {
        let overflow = || RollError::InvalidFormula {
            formula: formula.to_string(),
            reason: "total out of range".into(),
        };
        let mut terms = Vec::with_capacity(formula.terms.len());
        let mut total: i32 = 0;
        for (sign, term) in &formula.terms {
            let factor = sign.factor();
            let (dice, magnitude) = match *term {
                Term::Constant(n) => (Vec::new(), n),
                Term::Dice { count, die, keep } => {
                    let mut dice: Vec<DieResult> = (0..count)
                        .map(|_| DieResult {
                            die,
                            value: self.face(die),
                            kept: true,
                        })
                        .collect();
                    apply_keep(&mut dice, keep);
                    let sum = dice
                        .iter()
                        .filter(|d| d.kept)
                        .try_fold(0u32, |acc, d| acc.checked_add(d.value))
                        .ok_or_else(overflow)?;
                    (dice, sum)
                }
            };
            let value = i32::try_from(magnitude)
                .ok()
                .and_then(|m| m.checked_mul(factor))
                .ok_or_else(overflow)?;
            total = total.checked_add(value).ok_or_else(overflow)?;
            terms.push(TermRoll {
                term: term.to_string(),
                sign: factor,
                dice,
                value,
            });
        }
        Ok(Roll {
            formula: formula.to_string(),
            total,
            terms,
        })
    }
}

fn apply_keep(dice: &mut [DieResult], keep: Option<Keep>) {
    let (n, highest) = match keep {
        None => return,
        Some(Keep::Highest(n)) => (n as usize, true),
        Some(Keep::Lowest(n)) => (n as usize, false),
    };
    let mut order: Vec<usize> = (0..dice.len()).collect();
    if highest {
        order.sort_by(|&a, &b| dice[b].value.cmp(&dice[a].value));
    } else {
        order.sort_by(|&a, &b| dice[a].value.cmp(&dice[b].value));
    }
    for (rank, idx) in order.into_iter().enumerate() {
        dice[idx].kept = rank < n;
    }
}

impl RollEvaluator for DiceEvaluator {
    fn evaluate(&self, formula: &str) -> RollResult<Roll> {
        let parsed: Formula = formula.parse()?;
        let roll = self.roll(&parsed)?;
        tracing::debug!(formula, total = roll.total, "formula evaluated");
        Ok(roll)
    }
}
