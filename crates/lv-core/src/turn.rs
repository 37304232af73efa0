//! Cooperative-loop time model.
//!
//! # Design
//!
//! Each participant (model world, view world) processes work in *turns*.
//! A handler runs to completion inside the current turn; deferred work is
//! keyed by the turn at which it becomes due:
//!
//!   due = now + delay
//!
//! A delay of 0 means "after the current handler finishes, before the next
//! message".  Integer turns keep ordering exact and comparisons O(1).

use std::fmt;

// ── Turn ─────────────────────────────────────────────────────────────────────

/// An absolute turn counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Turn(pub u64);

impl Turn {
    pub const ZERO: Turn = Turn(0);

    /// Return the turn `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Turn {
        Turn(self.0.saturating_add(n))
    }
}

impl std::ops::Add<u64> for Turn {
    type Output = Turn;
    #[inline]
    fn add(self, rhs: u64) -> Turn {
        self.offset(rhs)
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn {}", self.0)
    }
}

// ── TurnClock ─────────────────────────────────────────────────────────────────

/// Tracks the current turn of one participant.
#[derive(Clone, Debug, Default)]
pub struct TurnClock {
    current: Turn,
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> Turn {
        self.current
    }

    /// Advance by one turn and return the new current turn.
    #[inline]
    pub fn advance(&mut self) -> Turn {
        self.current = self.current.offset(1);
        self.current
    }
}
