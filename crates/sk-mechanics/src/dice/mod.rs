//! Dice, formulas, and evaluation.
//!
//! Formulas use a small language: dice terms `NdX`, keep-highest `NdXkhK`,
//! keep-lowest `NdXklK`, integer constants, joined with `+` and `-`.
//! Attack rolls are always `1d20 + bonus` followed by an optional accuracy
//! or difficulty term built by [`accuracy_formula`].

pub mod evaluator;
pub mod formula;
pub mod roll;

pub use evaluator::{DiceEvaluator, RollEvaluator};
pub use formula::{Formula, Keep, Sign, Term, accuracy_formula};
pub use roll::{DieResult, Roll, TermRoll};

use serde::{Deserialize, Serialize};

/// A polyhedral die type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Die {
    /// Three-sided die.
    D3,
    /// Six-sided die.
    D6,
    /// Twenty-sided die.
    D20,
    /// A die with any other number of sides.
    Custom(u32),
}

impl Die {
    /// Returns the number of sides on this die.
    pub fn sides(self) -> u32 {
        match self {
            Self::D3 => 3,
            Self::D6 => 6,
            Self::D20 => 20,
            Self::Custom(n) => n,
        }
    }

    /// The die with the given number of sides, or `None` below two.
    pub fn from_sides(sides: u32) -> Option<Self> {
        match sides {
            0 | 1 => None,
            3 => Some(Self::D3),
            6 => Some(Self::D6),
            20 => Some(Self::D20),
            n => Some(Self::Custom(n)),
        }
    }
}

impl std::fmt::Display for Die {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn die_sides() {
        assert_eq!(Die::D3.sides(), 3);
        assert_eq!(Die::D6.sides(), 6);
        assert_eq!(Die::D20.sides(), 20);
        assert_eq!(Die::Custom(8).sides(), 8);
    }

    #[test]
    fn die_from_sides() {
        assert_eq!(Die::from_sides(6), Some(Die::D6));
        assert_eq!(Die::from_sides(20), Some(Die::D20));
        assert_eq!(Die::from_sides(12), Some(Die::Custom(12)));
        assert_eq!(Die::from_sides(1), None);
    }

    #[test]
    fn die_display() {
        assert_eq!(Die::D20.to_string(), "d20");
        assert_eq!(Die::Custom(30).to_string(), "d30");
    }
}
