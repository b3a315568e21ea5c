//! I2C waveform generation
//!
//! Builds matched SDA/SCL transition streams for demos and tests. The
//! builder exposes bus-level operations (start, byte, restart, stop) on top
//! of raw level primitives; all timing is derived from a fixed bit period,
//! and SDA only changes while the clock is low except where a condition is
//! intended.

use crate::signal::{Level, ReplayCursor, Transition, TransitionSender};

/// Acknowledge behavior of the simulated target for one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckReply {
    Ack,
    Nak,
}

/// One wire's accumulating transition list.
struct Trace {
    level: Level,
    transitions: Vec<Transition>,
}

impl Trace {
    fn new(level: Level) -> Self {
        Self {
            level,
            transitions: Vec::new(),
        }
    }

    fn set(&mut self, sample: u64, level: Level) {
        if level != self.level {
            self.level = level;
            self.transitions.push(Transition::new(sample, level));
        }
    }
}

/// Builder for a two-wire I2C capture. Both wires idle high.
pub struct WaveformBuilder {
    sda: Trace,
    scl: Trace,
    cursor: u64,
    quarter: u64,
}

impl WaveformBuilder {
    /// `bit_period` is the length of one clock cycle in samples; it must be
    /// at least 4 so the four phases of a bit land on distinct samples.
    pub fn new(bit_period: u64) -> Self {
        assert!(bit_period >= 4, "bit period too short to phase a bit");
        Self {
            sda: Trace::new(Level::High),
            scl: Trace::new(Level::High),
            // lead-in so the first transition is not at sample 0
            cursor: bit_period,
            quarter: bit_period / 4,
        }
    }

    /// Advance the timeline without touching either wire.
    pub fn advance(&mut self, samples: u64) {
        self.cursor += samples;
    }

    /// Drive SDA to `level` at the current sample.
    pub fn set_sda(&mut self, level: Level) {
        self.sda.set(self.cursor, level);
    }

    /// Drive SCL to `level` at the current sample.
    pub fn set_scl(&mut self, level: Level) {
        self.scl.set(self.cursor, level);
    }

    /// Start condition: SDA falls while the clock is high. Both wires must
    /// currently be high.
    pub fn start(&mut self) {
        self.advance(self.quarter);
        self.set_sda(Level::Low);
        self.advance(self.quarter);
    }

    /// Repeated start: release both wires, then pull SDA low again under a
    /// high clock.
    pub fn restart(&mut self) {
        self.set_scl(Level::Low);
        self.advance(self.quarter);
        self.set_sda(Level::High);
        self.advance(self.quarter);
        self.set_scl(Level::High);
        self.advance(self.quarter);
        self.set_sda(Level::Low);
        self.advance(self.quarter);
    }

    /// Stop condition: SDA rises while the clock is high.
    pub fn stop(&mut self) {
        self.set_scl(Level::Low);
        self.advance(self.quarter);
        self.set_sda(Level::Low);
        self.advance(self.quarter);
        self.set_scl(Level::High);
        self.advance(self.quarter);
        self.set_sda(Level::High);
        self.advance(self.quarter);
    }

    /// One clock cycle carrying one data bit. SDA changes only while the
    /// clock is low.
    pub fn bit(&mut self, level: Level) {
        self.set_scl(Level::Low);
        self.advance(self.quarter);
        self.set_sda(level);
        self.advance(self.quarter);
        self.set_scl(Level::High);
        self.advance(2 * self.quarter);
    }

    /// One byte, MSB first, followed by the target's acknowledge bit.
    pub fn byte(&mut self, value: u8, ack: AckReply) {
        for i in (0..8).rev() {
            self.bit(Level::from_bit((value >> i) & 1 == 1));
        }
        let ack_level = match ack {
            AckReply::Ack => Level::Low,
            AckReply::Nak => Level::High,
        };
        self.bit(ack_level);
    }

    /// Finish and return the raw transition lists as `(sda, scl)`.
    pub fn into_transitions(self) -> (Vec<Transition>, Vec<Transition>) {
        (self.sda.transitions, self.scl.transitions)
    }

    /// Finish and return replay cursors as `(sda, scl)`.
    pub fn into_cursors(self) -> (ReplayCursor, ReplayCursor) {
        let (sda, scl) = self.into_transitions();
        (
            ReplayCursor::new(Level::High, sda),
            ReplayCursor::new(Level::High, scl),
        )
    }

    /// Finish by streaming both wires from one thread in global sample
    /// order, marking the idle wire quiet before each event. This is the
    /// discipline a single-threaded, time-ordered capture source must
    /// follow so the decoder never waits on a wire that is merely idle.
    pub fn feed_interleaved(self, sda_tx: &TransitionSender, scl_tx: &TransitionSender) {
        let (sda, scl) = self.into_transitions();
        let mut sda = sda.into_iter().peekable();
        let mut scl = scl.into_iter().peekable();
        loop {
            let next_is_sda = match (sda.peek(), scl.peek()) {
                (Some(a), Some(b)) => a.sample <= b.sample,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if next_is_sda {
                if let Some(t) = sda.next() {
                    scl_tx.mark_quiet(t.sample.saturating_sub(1));
                    if sda_tx.send(t).is_err() {
                        break;
                    }
                }
            } else if let Some(t) = scl.next() {
                sda_tx.mark_quiet(t.sample.saturating_sub(1));
                if scl_tx.send(t).is_err() {
                    break;
                }
            }
        }
        sda_tx.close();
        scl_tx.close();
    }

    /// Finish by sending each wire in full, one after the other. The
    /// channels must have capacity for a whole wire, so this suits buffered
    /// replays; use [`feed_interleaved`](Self::feed_interleaved) to pace a
    /// decoder through tight channels.
    pub fn feed(self, sda_tx: &TransitionSender, scl_tx: &TransitionSender) {
        let (sda, scl) = self.into_transitions();
        for t in sda {
            if sda_tx.send(t).is_err() {
                break;
            }
        }
        sda_tx.close();
        for t in scl {
            if scl_tx.send(t).is_err() {
                break;
            }
        }
        scl_tx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_strictly_increasing() {
        let mut wave = WaveformBuilder::new(40);
        wave.start();
        wave.byte(0x5a, AckReply::Ack);
        wave.restart();
        wave.byte(0xa5, AckReply::Nak);
        wave.stop();
        let (sda, scl) = wave.into_transitions();

        for wire in [&sda, &scl] {
            assert!(wire.windows(2).all(|w| w[0].sample < w[1].sample));
        }
        // alternating levels on each wire
        for wire in [&sda, &scl] {
            assert!(wire.windows(2).all(|w| w[0].level != w[1].level));
        }
    }

    #[test]
    fn test_sda_stable_while_clock_high_within_byte() {
        let mut wave = WaveformBuilder::new(40);
        wave.start();
        wave.byte(0xc3, AckReply::Ack);
        let (sda, scl) = wave.into_transitions();

        // reconstruct clock-high windows after the start condition
        let mut high_from = None;
        for t in &scl {
            match t.level {
                Level::High => high_from = Some(t.sample),
                Level::Low => {
                    if let Some(from) = high_from.take() {
                        assert!(
                            !sda.iter().any(|s| s.sample > from && s.sample < t.sample),
                            "SDA moved inside clock-high window [{from}, {}]",
                            t.sample
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_byte_produces_nine_clock_pulses() {
        let mut wave = WaveformBuilder::new(40);
        wave.start();
        wave.byte(0x00, AckReply::Ack);
        let (_, scl) = wave.into_transitions();
        let rising = scl.iter().filter(|t| t.level == Level::High).count();
        assert_eq!(rising, 9); // 8 data bits + ack
    }
}
