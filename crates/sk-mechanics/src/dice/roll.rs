//! Evaluated rolls.

use serde::{Deserialize, Serialize};

use super::Die;

/// The result of rolling a single die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieResult {
    /// The type of die that was rolled.
    pub die: Die,
    /// The value rolled (1 to die.sides()).
    pub value: u32,
    /// Whether the die counted toward the total after keep rules.
    pub kept: bool,
}

/// One evaluated formula term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRoll {
    /// The term as written, e.g. `2d6kh1` or `3`.
    pub term: String,
    /// `1` if added, `-1` if subtracted.
    pub sign: i32,
    /// Dice rolled for this term; empty for constants.
    pub dice: Vec<DieResult>,
    /// Signed contribution to the total.
    pub value: i32,
}

/// A fully evaluated formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    /// The formula that was evaluated.
    pub formula: String,
    /// The final total.
    pub total: i32,
    /// Per-term breakdown.
    pub terms: Vec<TermRoll>,
}

impl Roll {
    /// Every die rolled, in formula order.
    pub fn dice(&self) -> impl Iterator<Item = &DieResult> {
        self.terms.iter().flat_map(|t| t.dice.iter())
    }

    /// How many rolled dice show the given face, kept or not.
    pub fn count_of(&self, value: u32) -> usize {
        self.dice().filter(|d| d.value == value).count()
    }

    /// The natural value of the first d20 rolled, if any.
    pub fn natural_d20(&self) -> Option<u32> {
        self.dice()
            .find(|d| d.die == Die::D20 && d.kept)
            .map(|d| d.value)
    }

    /// A one-line breakdown such as `1d20 [14] + 2 - 2d6kh1 [5, (3)]`.
    ///
    /// Dropped dice are shown in parentheses.
    pub fn tooltip(&self) -> String {
        let mut out = String::new();
        for (i, t) in self.terms.iter().enumerate() {
            match (i, t.sign < 0) {
                (0, false) => {}
                (0, true) => out.push('-'),
                (_, false) => out.push_str(" + "),
                (_, true) => out.push_str(" - "),
            }
            out.push_str(&t.term);
            if !t.dice.is_empty() {
                let faces: Vec<String> = t
                    .dice
                    .iter()
                    .map(|d| {
                        if d.kept {
                            d.value.to_string()
                        } else {
                            format!("({})", d.value)
                        }
                    })
                    .collect();
                out.push_str(&format!(" [{}]", faces.join(", ")));
            }
        }
        out
    }
}

impl std::fmt::Display for Roll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.tooltip(), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn die(die: Die, value: u32, kept: bool) -> DieResult {
        DieResult { die, value, kept }
    }

    fn sample() -> Roll {
        Roll {
            formula: "1d20 + 2 - 2d6kh1".into(),
            total: 11,
            terms: vec![
                TermRoll {
                    term: "1d20".into(),
                    sign: 1,
                    dice: vec![die(Die::D20, 14, true)],
                    value: 14,
                },
                TermRoll {
                    term: "2".into(),
                    sign: 1,
                    dice: vec![],
                    value: 2,
                },
                TermRoll {
                    term: "2d6kh1".into(),
                    sign: -1,
                    dice: vec![die(Die::D6, 5, true), die(Die::D6, 3, false)],
                    value: -5,
                },
            ],
        }
    }

    #[test]
    fn tooltip_marks_dropped_dice() {
        assert_eq!(sample().tooltip(), "1d20 [14] + 2 - 2d6kh1 [5, (3)]");
        assert_eq!(sample().to_string(), "1d20 [14] + 2 - 2d6kh1 [5, (3)] = 11");
    }

    #[test]
    fn natural_d20_and_counts() {
        let r = sample();
        assert_eq!(r.natural_d20(), Some(14));
        assert_eq!(r.count_of(3), 1);
        assert_eq!(r.count_of(1), 0);
        assert_eq!(r.dice().count(), 3);
    }
}
