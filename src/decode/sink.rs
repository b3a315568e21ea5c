//! Results staging and commit

use super::types::{Frame, Marker};

/// Destination for decoded frames and markers.
///
/// Results are staged first and only become visible on `commit_results`; a
/// byte interrupted mid-decode therefore never leaks partial output. Packet
/// boundaries group committed frames between bus conditions.
pub trait ResultsSink {
    /// Stage a frame. Returns the frame's index, stable across commits.
    fn add_frame(&mut self, frame: Frame) -> u64;

    /// Stage a marker.
    fn add_marker(&mut self, marker: Marker);

    /// Make everything staged so far visible.
    fn commit_results(&mut self);

    /// Close the current packet and open a new one.
    fn commit_packet_and_start_new_packet(&mut self);

    /// Number of packets closed so far; doubles as the id of the packet
    /// currently being filled.
    fn num_packets(&self) -> u64;
}

/// In-memory sink, used by the session worker and by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    staged_frames: Vec<Frame>,
    staged_markers: Vec<Marker>,
    frames: Vec<Frame>,
    markers: Vec<Marker>,
    next_frame_index: u64,
    closed_packets: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed frames, in decode order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Committed markers, in decode order.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn into_parts(self) -> (Vec<Frame>, Vec<Marker>, u64) {
        (self.frames, self.markers, self.closed_packets)
    }
}

impl ResultsSink for MemorySink {
    fn add_frame(&mut self, frame: Frame) -> u64 {
        let index = self.next_frame_index;
        self.next_frame_index += 1;
        self.staged_frames.push(frame);
        index
    }

    fn add_marker(&mut self, marker: Marker) {
        self.staged_markers.push(marker);
    }

    fn commit_results(&mut self) {
        self.frames.append(&mut self.staged_frames);
        self.markers.append(&mut self.staged_markers);
    }

    fn commit_packet_and_start_new_packet(&mut self) {
        self.closed_packets += 1;
    }

    fn num_packets(&self) -> u64 {
        self.closed_packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{AckStatus, FrameKind, MarkerGlyph, Wire};

    fn frame(value: u8) -> Frame {
        Frame {
            start_sample: 0,
            end_sample: 10,
            value,
            value2: 0,
            kind: FrameKind::Data,
            ack: AckStatus::Acked,
        }
    }

    #[test]
    fn test_staged_results_invisible_until_commit() {
        let mut sink = MemorySink::new();
        sink.add_frame(frame(0xaa));
        sink.add_marker(Marker {
            sample: 5,
            glyph: MarkerGlyph::UpArrow,
            wire: Wire::Scl,
        });
        assert!(sink.frames().is_empty());
        assert!(sink.markers().is_empty());

        sink.commit_results();
        assert_eq!(sink.frames().len(), 1);
        assert_eq!(sink.markers().len(), 1);
    }

    #[test]
    fn test_frame_indices_are_stable_across_commits() {
        let mut sink = MemorySink::new();
        assert_eq!(sink.add_frame(frame(1)), 0);
        sink.commit_results();
        assert_eq!(sink.add_frame(frame(2)), 1);
        assert_eq!(sink.add_frame(frame(3)), 2);
    }

    #[test]
    fn test_packet_counter() {
        let mut sink = MemorySink::new();
        assert_eq!(sink.num_packets(), 0);
        sink.commit_packet_and_start_new_packet();
        sink.commit_packet_and_start_new_packet();
        assert_eq!(sink.num_packets(), 2);
    }
}
