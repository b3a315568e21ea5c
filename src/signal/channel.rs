//! Channel-backed wire streaming for live captures
//!
//! A capture source owns one [`TransitionSender`] per wire and pushes
//! transitions as they are observed; the decode worker owns the matching
//! [`ChannelCursor`]s. Bounded channels give natural backpressure: a source
//! that outruns the decoder blocks, a decoder that outruns the source
//! suspends inside the cursor.
//!
//! # Feeding discipline
//!
//! The decoder often has to rule out activity on one wire up to a clock
//! edge on the other. A transition alone can't answer that for a quiet
//! wire, so sources have two options:
//!
//! - feed each wire independently (its own thread, or buffered in full as
//!   [`WaveformBuilder::feed`] does) — a blocked cursor then always
//!   unblocks when the wire itself produces its next event; or
//! - interleave both wires on one thread in global sample order and call
//!   [`TransitionSender::mark_quiet`] on the idle wire before each event,
//!   as [`WaveformBuilder::feed_interleaved`] does, so the cursors resolve
//!   lookahead from sample availability instead of waiting for an edge
//!   that may be far in the future.
//!
//! [`WaveformBuilder::feed`]: crate::sim::WaveformBuilder::feed
//! [`WaveformBuilder::feed_interleaved`]: crate::sim::WaveformBuilder::feed_interleaved

use std::collections::VecDeque;

use crossbeam_channel::{bounded, Receiver as CrossbeamReceiver, SendError, Sender as CrossbeamSender};

use crate::watchdog::{OperationGuard, WatchdogHandle};
use crate::{Error, Result};

use super::cursor::SignalCursor;
use super::transition::{Level, Transition};

/// Message wrapper for progress and end-of-capture signaling.
///
/// Sources never construct this directly — `TransitionSender` wraps
/// everything and `ChannelCursor` unwraps it transparently.
#[derive(Debug, Clone, Copy)]
pub enum WireEvent {
    Transition(Transition),
    /// The wire has no transition at or before this sample.
    Quiet(u64),
    EndOfCapture,
}

/// Create a bounded wire channel: a sender for the capture source and a
/// cursor for the decoder. `initial_level` is the wire's level at sample 0.
pub fn wire_channel(capacity: usize, initial_level: Level) -> (TransitionSender, ChannelCursor) {
    let (tx, rx) = bounded(capacity);
    (
        TransitionSender::new(tx),
        ChannelCursor::new(rx, initial_level),
    )
}

/// Producing side of a wire channel.
pub struct TransitionSender {
    tx: CrossbeamSender<WireEvent>,
}

impl TransitionSender {
    fn new(tx: CrossbeamSender<WireEvent>) -> Self {
        Self { tx }
    }

    /// Send one transition. Blocks when the channel is full.
    pub fn send(&self, transition: Transition) -> std::result::Result<(), SendError<Transition>> {
        self.tx
            .send(WireEvent::Transition(transition))
            .map_err(|_| SendError(transition))
    }

    /// Declare that this wire has no transition at or before `through`.
    ///
    /// Single-threaded, time-ordered sources must mark quiet stretches on
    /// the idle wire whenever they emit an event on the other one; the
    /// decoder can then rule out conditions without waiting for the quiet
    /// wire's next real edge. Marks may lag or repeat; only their maximum
    /// matters.
    pub fn mark_quiet(&self, through: u64) {
        let _ = self.tx.send(WireEvent::Quiet(through));
    }

    /// Signal that this wire will never transition again.
    ///
    /// Call this before dropping the sender when the capture ends; the
    /// cursor treats a missing close as end of capture too, but an explicit
    /// close is unambiguous.
    pub fn close(&self) {
        let _ = self.tx.send(WireEvent::EndOfCapture);
    }
}

/// Cursor over a live wire channel.
///
/// Keeps a lookahead buffer so peeked transitions survive until consumed,
/// and tracks a quiet watermark so lookahead queries can resolve before the
/// wire's next real edge arrives. An optional watchdog handle flags
/// blocking receives that stall for too long.
pub struct ChannelCursor {
    rx: CrossbeamReceiver<WireEvent>,
    lookahead: VecDeque<Transition>,
    level: Level,
    position: u64,
    /// No unreceived transition exists at or before this sample.
    known_through: u64,
    ended: bool,
    watchdog_handle: Option<WatchdogHandle>,
}

impl ChannelCursor {
    pub fn new(rx: CrossbeamReceiver<WireEvent>, initial_level: Level) -> Self {
        Self {
            rx,
            lookahead: VecDeque::new(),
            level: initial_level,
            position: 0,
            known_through: 0,
            ended: false,
            watchdog_handle: None,
        }
    }

    /// Attach a watchdog handle to monitor blocking receives.
    pub fn with_watchdog(mut self, watchdog_handle: WatchdogHandle) -> Self {
        self.watchdog_handle = Some(watchdog_handle);
        self
    }

    fn absorb(&mut self, event: WireEvent) {
        match event {
            WireEvent::Transition(t) => {
                self.known_through = self.known_through.max(t.sample);
                self.lookahead.push_back(t);
            }
            WireEvent::Quiet(through) => {
                self.known_through = self.known_through.max(through);
            }
            WireEvent::EndOfCapture => self.ended = true,
        }
    }

    /// Absorb everything the channel already holds, without blocking.
    fn pump_available(&mut self) {
        while !self.ended {
            match self.rx.try_recv() {
                Ok(event) => self.absorb(event),
                Err(_) => break,
            }
        }
    }

    /// Block for one more event. Returns false once the wire is done.
    fn pump_blocking(&mut self) -> bool {
        if self.ended {
            return false;
        }
        let received = {
            let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
            self.rx.recv()
        };
        match received {
            Ok(event) => {
                self.absorb(event);
                !self.ended
            }
            Err(_) => {
                // sender dropped without an explicit close
                tracing::debug!("wire channel disconnected, treating as end of capture");
                self.ended = true;
                false
            }
        }
    }

    fn apply(&mut self, t: Transition) {
        self.position = t.sample;
        self.level = t.level;
    }
}

impl SignalCursor for ChannelCursor {
    fn level(&self) -> Level {
        self.level
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn advance_to_next_transition(&mut self) -> Result<u64> {
        loop {
            if let Some(t) = self.lookahead.pop_front() {
                self.apply(t);
                return Ok(t.sample);
            }
            if !self.pump_blocking() {
                return Err(Error::EndOfCapture);
            }
        }
    }

    fn advance_to_position(&mut self, sample: u64) {
        debug_assert!(sample >= self.position, "cursors only move forward");
        loop {
            match self.lookahead.front().copied() {
                Some(t) if t.sample <= sample => {
                    self.lookahead.pop_front();
                    self.apply(t);
                }
                Some(_) => break,
                None => {
                    // a quiet watermark past the target proves the wire
                    // holds its level up to there
                    if self.known_through >= sample || !self.pump_blocking() {
                        break;
                    }
                }
            }
        }
        self.position = sample.max(self.position);
    }

    fn has_pending_transition(&mut self) -> bool {
        self.pump_available();
        !self.lookahead.is_empty()
    }

    fn next_transition_sample(&mut self) -> Option<u64> {
        self.pump_available();
        self.lookahead.front().map(|t| t.sample)
    }

    fn peek_next_transition(&mut self) -> Option<u64> {
        loop {
            if let Some(t) = self.lookahead.front() {
                return Some(t.sample);
            }
            if !self.pump_blocking() {
                return None;
            }
        }
    }

    fn has_transition_before(&mut self, limit: u64) -> bool {
        loop {
            self.pump_available();
            if let Some(t) = self.lookahead.front() {
                return t.sample < limit;
            }
            // quiet coverage of limit-1 rules the window out without an edge
            if self.known_through.saturating_add(1) >= limit {
                return false;
            }
            if !self.pump_blocking() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cursor_follows_sent_transitions() {
        let (tx, mut cursor) = wire_channel(16, Level::High);
        tx.send(Transition::new(10, Level::Low)).unwrap();
        tx.send(Transition::new(20, Level::High)).unwrap();
        tx.close();

        assert_eq!(cursor.advance_to_next_transition().unwrap(), 10);
        assert_eq!(cursor.level(), Level::Low);
        assert_eq!(cursor.advance_to_next_transition().unwrap(), 20);
        assert!(matches!(
            cursor.advance_to_next_transition(),
            Err(Error::EndOfCapture)
        ));
        // end of capture is cached
        assert!(matches!(
            cursor.advance_to_next_transition(),
            Err(Error::EndOfCapture)
        ));
        assert_eq!(cursor.level(), Level::High);
    }

    #[test]
    fn test_peek_blocks_until_data_arrives() {
        let (tx, mut cursor) = wire_channel(4, Level::Low);
        let producer = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            tx.send(Transition::new(77, Level::High)).unwrap();
            tx.close();
        });

        assert_eq!(cursor.peek_next_transition(), Some(77));
        // peeking again is non-blocking and does not consume
        assert_eq!(cursor.next_transition_sample(), Some(77));
        assert_eq!(cursor.advance_to_next_transition().unwrap(), 77);
        assert_eq!(cursor.peek_next_transition(), None);
        producer.join().unwrap();
    }

    #[test]
    fn test_has_pending_is_nonblocking() {
        let (tx, mut cursor) = wire_channel(4, Level::Low);
        assert!(!cursor.has_pending_transition());
        tx.send(Transition::new(5, Level::High)).unwrap();
        assert!(cursor.has_pending_transition());
        assert_eq!(cursor.next_transition_sample(), Some(5));
    }

    #[test]
    fn test_dropped_sender_counts_as_end() {
        let (tx, mut cursor) = wire_channel(4, Level::Low);
        tx.send(Transition::new(5, Level::High)).unwrap();
        drop(tx);

        assert_eq!(cursor.advance_to_next_transition().unwrap(), 5);
        assert_eq!(cursor.peek_next_transition(), None);
    }

    #[test]
    fn test_advance_to_position_across_channel() {
        let (tx, mut cursor) = wire_channel(8, Level::High);
        tx.send(Transition::new(10, Level::Low)).unwrap();
        tx.send(Transition::new(30, Level::High)).unwrap();
        tx.send(Transition::new(50, Level::Low)).unwrap();
        tx.close();

        cursor.advance_to_position(35);
        assert_eq!(cursor.position(), 35);
        assert_eq!(cursor.level(), Level::High);
        assert_eq!(cursor.next_transition_sample(), Some(50));
    }

    #[test]
    fn test_quiet_mark_resolves_position_without_an_edge() {
        let (tx, mut cursor) = wire_channel(4, Level::High);
        tx.mark_quiet(100);

        // no transition anywhere near 80, but the watermark covers it
        cursor.advance_to_position(80);
        assert_eq!(cursor.position(), 80);
        assert_eq!(cursor.level(), Level::High);
        drop(tx);
    }

    #[test]
    fn test_quiet_mark_resolves_lookahead_window() {
        let (tx, mut cursor) = wire_channel(4, Level::High);
        tx.mark_quiet(100);
        assert!(!cursor.has_transition_before(101));

        // a later transition answers windows on both sides of it
        tx.send(Transition::new(150, Level::Low)).unwrap();
        assert!(!cursor.has_transition_before(120));
        assert!(cursor.has_transition_before(200));
        drop(tx);
    }

    #[test]
    fn test_window_past_watermark_blocks_until_answered() {
        let (tx, mut cursor) = wire_channel(4, Level::High);
        tx.mark_quiet(50);
        let producer = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            tx.mark_quiet(300);
            tx.close();
        });

        // nothing known about [50, 200) yet; the later mark settles it
        assert!(!cursor.has_transition_before(200));
        producer.join().unwrap();
    }
}
