//! Resource tracks (structure, stress, heat, HP, limited uses).
//!
//! A track is a numeric value clamped between zero and a maximum. Tracks are
//! persisted as `{ "value": n, "max": m }`.

use serde::{Deserialize, Serialize};

/// A numeric resource clamped to `0..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Current value.
    pub value: i32,
    /// Maximum value.
    pub max: i32,
}

impl Track {
    /// Create a track starting at its maximum.
    pub fn full(max: i32) -> Self {
        Self { value: max, max }
    }

    /// Create a track starting empty.
    pub fn empty(max: i32) -> Self {
        Self { value: 0, max }
    }

    /// Create a track with an explicit starting value, clamped into range.
    pub fn new(value: i32, max: i32) -> Self {
        Self {
            value: value.clamp(0, max.max(0)),
            max,
        }
    }

    /// Adjust the track by a delta, clamping to bounds. Returns the new value.
    pub fn adjust(&mut self, delta: i32) -> i32 {
        self.value = (self.value + delta).clamp(0, self.max.max(0));
        self.value
    }

    /// Set the value directly, clamping to bounds.
    pub fn set(&mut self, value: i32) -> i32 {
        self.value = value.clamp(0, self.max.max(0));
        self.value
    }

    /// How far the track is below its maximum.
    pub fn missing(&self) -> i32 {
        self.max - self.value
    }

    /// Returns true if the track is at zero.
    pub fn is_empty(&self) -> bool {
        self.value <= 0
    }

    /// Returns true if the track is at its maximum.
    pub fn is_full(&self) -> bool {
        self.value >= self.max
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::full(1)
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.value, self.max)
    }
}
