//! Formula parsing, rendering, and rewriting.

use std::fmt;
use std::str::FromStr;

use super::Die;
use crate::error::RollError;

const MAX_DICE: u32 = 100;

/// Whether a term is added or subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Added to the total.
    Plus,
    /// Subtracted from the total.
    Minus,
}

impl Sign {
    /// `1` or `-1`.
    pub fn factor(self) -> i32 {
        match self {
            Self::Plus => 1,
            Self::Minus => -1,
        }
    }
}

/// Which dice of a group count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Keep the highest `n` dice.
    Highest(u32),
    /// Keep the lowest `n` dice.
    Lowest(u32),
}

/// One term of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    /// A group of identical dice.
    Dice {
        /// How many dice to roll.
        count: u32,
        /// Which die.
        die: Die,
        /// Optional keep rule.
        keep: Option<Keep>,
    },
    /// A flat number.
    Constant(u32),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dice { count, die, keep } => {
                write!(f, "{count}{die}")?;
                match keep {
                    Some(Keep::Highest(n)) => write!(f, "kh{n}"),
                    Some(Keep::Lowest(n)) => write!(f, "kl{n}"),
                    None => Ok(()),
                }
            }
            Self::Constant(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed dice formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    /// Signed terms in order.
    pub terms: Vec<(Sign, Term)>,
}

impl Formula {
    /// The critical-hit version of this formula: every dice group without a
    /// keep rule is rolled twice over, keeping the highest of the original count.
    pub fn crit(&self) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|(sign, term)| match *term {
                Term::Dice {
                    count,
                    die,
                    keep: None,
                } => (
                    *sign,
                    Term::Dice {
                        count: count * 2,
                        die,
                        keep: Some(Keep::Highest(count)),
                    },
                ),
                other => (*sign, other),
            })
            .collect();
        Self { terms }
    }

    /// Whether the formula rolls any dice.
    pub fn has_dice(&self) -> bool {
        self.terms.iter().any(|(_, t)| matches!(t, Term::Dice { .. }))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sign, term)) in self.terms.iter().enumerate() {
            match (i, sign) {
                (0, Sign::Plus) => write!(f, "{term}")?,
                (0, Sign::Minus) => write!(f, "-{term}")?,
                (_, Sign::Plus) => write!(f, " + {term}")?,
                (_, Sign::Minus) => write!(f, " - {term}")?,
            }
        }
        Ok(())
    }
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_term(body: &str) -> Result<Term, String> {
    let Some((count, rest)) = body.split_once('d') else {
        return parse_number(body)
            .map(Term::Constant)
            .ok_or_else(|| format!("'{body}' is not a number or dice term"));
    };

    let count = if count.is_empty() {
        1
    } else {
        parse_number(count).ok_or_else(|| format!("bad dice count in '{body}'"))?
    };
    if count == 0 || count > MAX_DICE {
        return Err(format!("dice count must be between 1 and {MAX_DICE}"));
    }

    let (sides, keep) = if let Some((sides, n)) = rest.split_once("kh") {
        (sides, Some((true, n)))
    } else if let Some((sides, n)) = rest.split_once("kl") {
        (sides, Some((false, n)))
    } else {
        (rest, None)
    };

    let die = parse_number(sides)
        .and_then(Die::from_sides)
        .ok_or_else(|| format!("bad die size in '{body}'"))?;

    let keep = match keep {
        None => None,
        Some((highest, n)) => {
            let n = parse_number(n).ok_or_else(|| format!("bad keep count in '{body}'"))?;
            if n == 0 || n > count {
                return Err(format!("keep count must be between 1 and {count}"));
            }
            Some(if highest {
                Keep::Highest(n)
            } else {
                Keep::Lowest(n)
            })
        }
    };

    Ok(Term::Dice { count, die, keep })
}

impl FromStr for Formula {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| RollError::InvalidFormula {
            formula: s.to_string(),
            reason,
        };
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if compact.is_empty() {
            return Err(invalid("empty formula".into()));
        }

        let mut terms = Vec::new();
        let mut sign = Sign::Plus;
        let mut body = String::new();
        for (i, c) in compact.chars().enumerate() {
            if c == '+' || c == '-' {
                if body.is_empty() {
                    if i > 0 {
                        return Err(invalid("operator without a term".into()));
                    }
                } else {
                    terms.push((sign, parse_term(&body).map_err(invalid)?));
                    body.clear();
                }
                sign = if c == '-' { Sign::Minus } else { Sign::Plus };
            } else {
                body.push(c);
            }
        }
        if body.is_empty() {
            return Err(invalid("trailing operator".into()));
        }
        terms.push((sign, parse_term(&body).map_err(invalid)?));

        Ok(Self { terms })
    }
}

/// Build the attack formula `1d20 + bonus` plus the net accuracy term.
///
/// A positive `total` adds accuracy dice, a negative one subtracts difficulty
/// dice. A single die is written `1d6`; more are `Nd6kh1`. A negative bonus
/// is written `1d20 - n`.
pub fn accuracy_formula(bonus: i32, total: i32) -> String {
    let mut formula = if bonus < 0 {
        format!("1d20 - {}", bonus.unsigned_abs())
    } else {
        format!("1d20 + {bonus}")
    };
    let op = if total > 0 { '+' } else { '-' };
    match total.unsigned_abs() {
        0 => {}
        1 => formula.push_str(&format!(" {op} 1d6")),
        n => formula.push_str(&format!(" {op} {n}d6kh1")),
    }
    formula
}
