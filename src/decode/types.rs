//! Decoded result types: frames, markers, acknowledge status

/// Which of the two bus wires a marker is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Sda,
    Scl,
}

/// What a decoded byte means on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// First acknowledged byte after a start or restart condition.
    Address,
    /// Any subsequent byte.
    Data,
}

impl FrameKind {
    /// Numeric code used on the enrichment wire.
    pub fn wire_code(self) -> u8 {
        match self {
            FrameKind::Address => 0,
            FrameKind::Data => 1,
        }
    }
}

/// Acknowledge outcome of a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Target pulled SDA low during the ninth clock.
    Acked,
    /// SDA stayed high during the ninth clock; rendered as a warning.
    NakWarning,
    /// The ninth clock never completed cleanly.
    Missing,
}

impl AckStatus {
    /// Flag bits carried alongside the frame, also used on the enrichment
    /// wire: bit 0 = acked, bit 1 = ack missing, bit 6 = display warning.
    pub fn flag_bits(self) -> u8 {
        match self {
            AckStatus::Acked => 0x01,
            AckStatus::NakWarning => 0x40,
            AckStatus::Missing => 0x02,
        }
    }
}

/// One decoded byte, spanning the samples of its eight data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Rising clock edge of the first data bit.
    pub start_sample: u64,
    /// Falling clock edge bounding the last completed bit cycle.
    pub end_sample: u64,
    /// The eight data bits, MSB first.
    pub value: u8,
    /// Reserved secondary value, always 0.
    pub value2: u64,
    pub kind: FrameKind,
    pub ack: AckStatus,
}

/// Glyph vocabulary for display markers.
///
/// The names double as the identifiers the enrichment protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerGlyph {
    #[default]
    Dot,
    ErrorDot,
    Square,
    ErrorSquare,
    UpArrow,
    DownArrow,
    X,
    ErrorX,
    Start,
    Stop,
    One,
    Zero,
}

impl MarkerGlyph {
    /// Parse a protocol glyph name. Unknown names fall back to `Dot` so a
    /// misspelled glyph still produces a visible marker.
    pub fn from_name(name: &str) -> MarkerGlyph {
        match name {
            "dot" => MarkerGlyph::Dot,
            "errordot" => MarkerGlyph::ErrorDot,
            "square" => MarkerGlyph::Square,
            "errorsquare" => MarkerGlyph::ErrorSquare,
            "uparrow" => MarkerGlyph::UpArrow,
            "downarrow" => MarkerGlyph::DownArrow,
            "x" => MarkerGlyph::X,
            "errorx" => MarkerGlyph::ErrorX,
            "start" => MarkerGlyph::Start,
            "stop" => MarkerGlyph::Stop,
            "one" => MarkerGlyph::One,
            "zero" => MarkerGlyph::Zero,
            _ => MarkerGlyph::Dot,
        }
    }
}

/// A display marker pinned to one sample on one wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub sample: u64,
    pub glyph: MarkerGlyph,
    pub wire: Wire,
}
