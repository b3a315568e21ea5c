//! The I2C bit/byte/frame state machine
//!
//! Decoding walks both wires strictly forward, one clock cycle at a time.
//! Each bit is handled in two phases: phase one advances the clock to its
//! rising edge and samples SDA there; phase two advances the clock to the
//! following falling edge. In both phases, any SDA activity while the clock
//! is high is a start/stop condition, which invalidates the byte in
//! progress. Phase two always runs, even after an interrupted phase one, so
//! the clock ends every cycle parked on a falling edge.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::enrich::{EnrichmentBridge, MarkerQuery};
use crate::signal::{Level, SignalCursor};
use crate::{Error, Result};

use super::sink::ResultsSink;
use super::types::{AckStatus, Frame, FrameKind, Marker, MarkerGlyph, Wire};

/// Outcome of a bit's sampling phase.
enum BitPhaseOne {
    /// Clock reached its rising edge cleanly; SDA was sampled there.
    Sampled {
        level: Level,
        rising_edge: u64,
        frame_end: u64,
    },
    /// A start/stop condition fired before the cycle completed. The
    /// condition has already been recorded.
    Interrupted,
}

/// Streaming I2C decoder over two wire cursors.
pub struct I2cDecoder<C: SignalCursor, S: ResultsSink> {
    sda: C,
    scl: C,
    sink: S,
    bridge: Option<EnrichmentBridge>,
    /// True until the next acknowledged byte, which is then an address.
    needs_address: bool,
    /// Rising clock edges of the current byte's good bits, in order.
    rising_edges: Vec<u64>,
    bytes_decoded: u64,
}

impl<C: SignalCursor, S: ResultsSink> I2cDecoder<C, S> {
    pub fn new(sda: C, scl: C, sink: S) -> Self {
        Self {
            sda,
            scl,
            sink,
            bridge: None,
            needs_address: true,
            rising_edges: Vec::with_capacity(8),
            bytes_decoded: 0,
        }
    }

    /// Attach an enrichment bridge; every committed frame is offered to it
    /// for extra markers.
    pub fn with_enrichment(mut self, bridge: EnrichmentBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Decode until the capture ends or `cancel` is raised. Cancellation is
    /// polled between bytes, so the byte in flight always finishes.
    ///
    /// Running off the end of the capture is the normal way out and maps to
    /// `Ok(())`.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<()> {
        let outcome = self.run_decode(cancel);
        if let Some(bridge) = self.bridge.take() {
            bridge.shutdown();
        }
        match outcome {
            Err(Error::EndOfCapture) => {
                info!(bytes = self.bytes_decoded, "capture ended, decode complete");
                Ok(())
            }
            other => other,
        }
    }

    fn run_decode(&mut self, cancel: &AtomicBool) -> Result<()> {
        self.seek_start()?;
        self.scl.advance_to_next_transition()?; // clock is now low

        loop {
            self.decode_byte()?;
            if cancel.load(Ordering::Relaxed) {
                info!(bytes = self.bytes_decoded, "cancellation requested, stopping");
                return Ok(());
            }
        }
    }

    /// Scan for the first start condition: SDA falling while the clock is
    /// high. Emits the start marker but no packet boundary; nothing precedes
    /// the first packet.
    fn seek_start(&mut self) -> Result<()> {
        loop {
            self.sda.advance_to_next_transition()?;
            if self.sda.level() == Level::Low {
                self.scl.advance_to_position(self.sda.position());
                if self.scl.level() == Level::High {
                    break;
                }
            }
        }
        debug!(sample = self.sda.position(), "first start condition");
        self.sink.add_marker(Marker {
            sample: self.sda.position(),
            glyph: MarkerGlyph::Start,
            wire: Wire::Sda,
        });
        Ok(())
    }

    /// Decode one byte plus its acknowledge bit. A condition anywhere in the
    /// eight data bits abandons the byte without a frame; a condition in the
    /// acknowledge cycle still produces a frame, flagged ack-missing.
    fn decode_byte(&mut self) -> Result<()> {
        self.rising_edges.clear();
        let mut value: u8 = 0;
        let mut start_sample = 0u64;

        for i in 0..8 {
            let phase_one = self.bit_phase_one()?;
            // phase two runs regardless, so the clock is parked on a falling
            // edge before the next cycle starts
            let settled = self.bit_phase_two()?;
            match phase_one {
                BitPhaseOne::Sampled {
                    level, rising_edge, ..
                } if settled => {
                    value = (value << 1) | u8::from(level.is_high());
                    self.rising_edges.push(rising_edge);
                    if i == 0 {
                        start_sample = rising_edge;
                    }
                }
                _ => return Ok(()),
            }
        }

        let last_valid_sample = self.scl.position();
        let ack_phase = self.bit_phase_one()?;
        let (ack, end_sample) = match ack_phase {
            BitPhaseOne::Sampled {
                level: Level::Low,
                frame_end,
                ..
            } => (AckStatus::Acked, frame_end),
            BitPhaseOne::Sampled { frame_end, .. } => (AckStatus::NakWarning, frame_end),
            // the condition has already re-armed the address search
            BitPhaseOne::Interrupted => (AckStatus::Missing, last_valid_sample),
        };

        let kind = if self.needs_address && ack != AckStatus::Missing {
            self.needs_address = false;
            FrameKind::Address
        } else {
            FrameKind::Data
        };

        let frame = Frame {
            start_sample,
            end_sample,
            value,
            value2: 0,
            kind,
            ack,
        };
        debug!(
            "byte 0x{:02x} [{}, {}] {:?} {:?}",
            value, start_sample, end_sample, kind, ack
        );
        let frame_index = self.sink.add_frame(frame);
        self.bytes_decoded += 1;

        for &edge in &self.rising_edges {
            self.sink.add_marker(Marker {
                sample: edge,
                glyph: MarkerGlyph::UpArrow,
                wire: Wire::Scl,
            });
        }

        self.enrich_frame(frame_index, &frame);
        self.sink.commit_results();

        self.bit_phase_two()?;
        Ok(())
    }

    /// Ask the enrichment process for extra markers on this frame. Failures
    /// degrade: the exchange is abandoned and markers are disabled for the
    /// rest of the capture.
    fn enrich_frame(&mut self, frame_index: u64, frame: &Frame) {
        let Some(bridge) = self.bridge.as_ref() else {
            return;
        };
        if !bridge.markers_enabled() {
            return;
        }

        let query = MarkerQuery {
            packet_id: Some(self.sink.num_packets()),
            frame_index,
            bit_count: self.rising_edges.len() as u32,
            start_sample: frame.start_sample,
            end_sample: frame.end_sample,
            frame_kind: frame.kind.wire_code(),
            frame_flags: frame.ack.flag_bits(),
            value: frame.value,
        };

        let responses = match bridge.request_markers(&query) {
            Ok(responses) => responses,
            Err(e) => {
                warn!(error = %e, "enrichment exchange failed, disabling markers");
                bridge.disable_markers();
                return;
            }
        };

        for response in responses {
            if response.channel != "sda" {
                warn!(
                    channel = %response.channel,
                    "marker requested on unknown channel, ignoring"
                );
                continue;
            }
            match self.rising_edges.get(response.bit_index) {
                Some(&sample) => self.sink.add_marker(Marker {
                    sample,
                    glyph: response.glyph,
                    wire: Wire::Sda,
                }),
                None => warn!(
                    bit_index = response.bit_index,
                    "marker index past the last decoded bit, ignoring"
                ),
            }
        }
    }

    /// Phase one: clock low to rising edge, sample SDA there, then make sure
    /// no condition fires before the clock's next falling edge.
    fn bit_phase_one(&mut self) -> Result<BitPhaseOne> {
        // the clock must be low on entry
        let rising_edge = self.scl.advance_to_next_transition()?;
        let mut frame_end = rising_edge;
        self.sda.advance_to_position(rising_edge); // data is read on the clock's rising edge
        let level = self.sda.level();

        // The clock may never fall again at the very end of a capture. Check
        // the cheap buffered view first, then suspend until the clock's fate
        // is known.
        let next_falling = if self.scl.has_pending_transition() {
            self.scl.next_transition_sample()
        } else {
            self.scl.peek_next_transition()
        };

        let Some(next_falling) = next_falling else {
            // the clock is done for good; anything SDA still does while the
            // clock idles high is a start/stop condition
            return match self.sda.peek_next_transition() {
                Some(_) => {
                    let sample = self.sda.advance_to_next_transition()?;
                    self.scl.advance_to_position(sample);
                    self.record_condition();
                    Ok(BitPhaseOne::Interrupted)
                }
                None => Err(Error::EndOfCapture),
            };
        };

        // clock is high until next_falling; an SDA change strictly before it
        // is a start/stop condition
        if self.sda.has_transition_before(next_falling) {
            let sample = self.sda.advance_to_next_transition()?;
            self.scl.advance_to_position(sample); // keep the clock in step
            self.record_condition();
            return Ok(BitPhaseOne::Interrupted);
        }

        frame_end = frame_end.max(next_falling);
        Ok(BitPhaseOne::Sampled {
            level,
            rising_edge,
            frame_end,
        })
    }

    /// Phase two: clock to its falling edge, recording any conditions that
    /// fire on the way. Returns whether the cycle stayed clean. At end of
    /// capture there is nothing left to settle and the phase reports an
    /// unclean cycle without error.
    fn bit_phase_two(&mut self) -> Result<bool> {
        let falling_edge = match self.scl.advance_to_next_transition() {
            Ok(sample) => sample,
            Err(Error::EndOfCapture) => return Ok(false),
            Err(e) => return Err(e),
        };

        let mut clean = true;
        while self.sda.has_transition_before(falling_edge) {
            self.sda.advance_to_next_transition()?;
            self.record_condition();
            clean = false;
        }
        Ok(clean)
    }

    /// Record a start/stop condition at the SDA cursor's position: SDA
    /// falling while the clock is high is a start (or restart), rising is a
    /// stop. Either way the current packet closes and the next acknowledged
    /// byte is an address again.
    fn record_condition(&mut self) {
        let sample = self.sda.position();
        let glyph = if self.sda.level() == Level::Low {
            MarkerGlyph::Start
        } else {
            MarkerGlyph::Stop
        };
        debug!(sample, ?glyph, "bus condition");
        self.sink.add_marker(Marker {
            sample,
            glyph,
            wire: Wire::Sda,
        });
        self.needs_address = true;
        self.sink.commit_packet_and_start_new_packet();
        self.sink.commit_results();
    }
}
