//! Forward-only cursors over a single wire's transition stream

use std::collections::VecDeque;

use crate::Result;

use super::transition::{Level, Transition};

/// Forward-only view over one wire of a capture.
///
/// A cursor always sits at a definite `(position, level)`. Advancing consumes
/// transitions; positions never move backwards. Blocking operations suspend
/// the calling thread until the backing stream produces more data or reports
/// end of capture — this is how decode workers pace themselves against a live
/// capture without polling.
pub trait SignalCursor {
    /// Current level of the wire at [`position`](Self::position).
    fn level(&self) -> Level;

    /// Current sample position.
    fn position(&self) -> u64;

    /// Advance to the next transition and return its sample number.
    /// The cursor's level flips to the transition's level. Blocking.
    ///
    /// Returns `Err(Error::EndOfCapture)` once the stream is exhausted; the
    /// cursor then holds its last level forever.
    fn advance_to_next_transition(&mut self) -> Result<u64>;

    /// Advance to an absolute sample position, applying every transition at
    /// or before it. Blocking. Positions already passed are a caller bug.
    ///
    /// At end of capture the wire simply holds its last level, so this
    /// always succeeds.
    fn advance_to_position(&mut self, sample: u64);

    /// Whether a future transition is already known without blocking.
    /// `false` means "none buffered yet", not "the wire is done".
    fn has_pending_transition(&mut self) -> bool;

    /// Sample number of the next known transition, without blocking.
    /// `None` when nothing is buffered.
    fn next_transition_sample(&mut self) -> Option<u64>;

    /// Sample number of the next transition, blocking until it is known.
    /// `None` means the capture ended and this wire will never move again.
    /// Does not advance the cursor.
    fn peek_next_transition(&mut self) -> Option<u64>;

    /// Whether the wire changes level strictly before `limit`. May block,
    /// but resolves as soon as the stream's knowledge covers the window —
    /// a buffered later transition, a quiet mark, or end of capture all
    /// answer it without waiting for the wire's next real edge.
    fn has_transition_before(&mut self, limit: u64) -> bool;
}

/// Cursor over a fully in-memory transition list.
///
/// Used by the waveform simulator and by tests; never blocks, and
/// `has_pending_transition` is exact rather than best-effort.
pub struct ReplayCursor {
    transitions: VecDeque<Transition>,
    level: Level,
    position: u64,
}

impl ReplayCursor {
    /// Create a cursor positioned at sample 0 with the given initial level.
    ///
    /// `transitions` must be strictly increasing in sample number and
    /// strictly alternating in level.
    pub fn new(initial_level: Level, transitions: Vec<Transition>) -> Self {
        debug_assert!(
            transitions.windows(2).all(|w| w[0].sample < w[1].sample),
            "transitions must be strictly increasing"
        );
        Self {
            transitions: transitions.into(),
            level: initial_level,
            position: 0,
        }
    }

    fn apply(&mut self, t: Transition) {
        self.position = t.sample;
        self.level = t.level;
    }
}

impl SignalCursor for ReplayCursor {
    fn level(&self) -> Level {
        self.level
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn advance_to_next_transition(&mut self) -> Result<u64> {
        match self.transitions.pop_front() {
            Some(t) => {
                self.apply(t);
                Ok(t.sample)
            }
            None => Err(crate::Error::EndOfCapture),
        }
    }

    fn advance_to_position(&mut self, sample: u64) {
        debug_assert!(sample >= self.position, "cursors only move forward");
        while let Some(t) = self.transitions.front().copied() {
            if t.sample > sample {
                break;
            }
            self.transitions.pop_front();
            self.apply(t);
        }
        self.position = sample.max(self.position);
    }

    fn has_pending_transition(&mut self) -> bool {
        !self.transitions.is_empty()
    }

    fn next_transition_sample(&mut self) -> Option<u64> {
        self.transitions.front().map(|t| t.sample)
    }

    fn peek_next_transition(&mut self) -> Option<u64> {
        self.next_transition_sample()
    }

    fn has_transition_before(&mut self, limit: u64) -> bool {
        self.transitions
            .front()
            .is_some_and(|t| t.sample < limit)
    }
}
