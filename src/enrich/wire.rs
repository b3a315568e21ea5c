//! Line protocol spoken with the enrichment process
//!
//! Requests and responses are single text lines. Fields are separated by a
//! tab, lines end with a newline, numeric fields are lowercase hex without a
//! prefix. A blank line from the process terminates a multi-line response.

use crate::decode::MarkerGlyph;

pub const UNIT_SEPARATOR: char = '\t';
pub const LINE_SEPARATOR: char = '\n';

const FEATURE_KEYWORD: &str = "FEATURE";
const MARKER_KEYWORD: &str = "MARKER";

/// Only this exact reply opts a feature out; anything else keeps it on.
pub const FEATURE_DISABLED_REPLY: &str = "no";

/// Enrichment feature classes negotiated at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureCategory {
    /// Bubble text over frames.
    Bubble,
    /// Extra display markers on individual bits.
    Marker,
    /// Tabular/export text for frames.
    Tabular,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 3] = [
        FeatureCategory::Bubble,
        FeatureCategory::Marker,
        FeatureCategory::Tabular,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeatureCategory::Bubble => "bubble",
            FeatureCategory::Marker => "marker",
            FeatureCategory::Tabular => "tabular",
        }
    }
}

/// `FEATURE<tab><category><newline>` — asks whether the process wants to
/// handle a feature class at all.
pub fn encode_feature_query(category: FeatureCategory) -> String {
    format!(
        "{FEATURE_KEYWORD}{UNIT_SEPARATOR}{}{LINE_SEPARATOR}",
        category.name()
    )
}

/// Everything the enrichment process learns about one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerQuery {
    /// Packet the frame belongs to; encoded as an empty field when unknown.
    pub packet_id: Option<u64>,
    pub frame_index: u64,
    /// Number of good data bits in the frame (indexable by responses).
    pub bit_count: u32,
    pub start_sample: u64,
    pub end_sample: u64,
    pub frame_kind: u8,
    pub frame_flags: u8,
    pub value: u8,
}

/// `MARKER<tab><fields...><newline>`. The trailing `0` field is the frame's
/// always-zero secondary value, kept on the wire for compatibility.
pub fn encode_marker_query(query: &MarkerQuery) -> String {
    let packet = match query.packet_id {
        Some(id) => format!("{id:x}"),
        None => String::new(),
    };
    format!(
        "{MARKER_KEYWORD}\t{packet}\t{:x}\t{:x}\t{:x}\t{:x}\t{:x}\t{:x}\t{:x}\t0{LINE_SEPARATOR}",
        query.frame_index,
        query.bit_count,
        query.start_sample,
        query.end_sample,
        query.frame_kind,
        query.frame_flags,
        query.value,
    )
}

/// One line of a marker response: `<bit_index><tab><channel><tab><glyph>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerResponse {
    /// Index into the frame's rising-edge list, not a sample number.
    pub bit_index: usize,
    pub channel: String,
    pub glyph: MarkerGlyph,
}

/// Parse a response line. Lines that don't fit the shape yield `None` and
/// are skipped by the caller; extra trailing fields are tolerated.
pub fn parse_marker_response(line: &str) -> Option<MarkerResponse> {
    let mut fields = line.split(UNIT_SEPARATOR);
    let bit_index = usize::from_str_radix(fields.next()?, 16).ok()?;
    let channel = fields.next()?.to_string();
    let glyph = MarkerGlyph::from_name(fields.next()?);
    Some(MarkerResponse {
        bit_index,
        channel,
        glyph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_query_format() {
        assert_eq!(
            encode_feature_query(FeatureCategory::Marker),
            "FEATURE\tmarker\n"
        );
        assert_eq!(
            encode_feature_query(FeatureCategory::Bubble),
            "FEATURE\tbubble\n"
        );
    }

    #[test]
    fn test_marker_query_fields_are_hex() {
        let query = MarkerQuery {
            packet_id: Some(10),
            frame_index: 255,
            bit_count: 8,
            start_sample: 0x1000,
            end_sample: 0x1fff,
            frame_kind: 1,
            frame_flags: 0x40,
            value: 0xa5,
        };
        assert_eq!(
            encode_marker_query(&query),
            "MARKER\ta\tff\t8\t1000\t1fff\t1\t40\ta5\t0\n"
        );
    }

    #[test]
    fn test_marker_query_blank_packet_id() {
        let query = MarkerQuery {
            packet_id: None,
            frame_index: 0,
            bit_count: 8,
            start_sample: 1,
            end_sample: 2,
            frame_kind: 0,
            frame_flags: 1,
            value: 0,
        };
        assert_eq!(encode_marker_query(&query), "MARKER\t\t0\t8\t1\t2\t0\t1\t0\t0\n");
    }

    #[test]
    fn test_parse_marker_response() {
        let r = parse_marker_response("3\tsda\tsquare").unwrap();
        assert_eq!(r.bit_index, 3);
        assert_eq!(r.channel, "sda");
        assert_eq!(r.glyph, MarkerGlyph::Square);
    }

    #[test]
    fn test_parse_tolerates_extra_fields_and_unknown_glyphs() {
        let r = parse_marker_response("a\tscl\tnonsense\textra").unwrap();
        assert_eq!(r.bit_index, 10);
        assert_eq!(r.channel, "scl");
        assert_eq!(r.glyph, MarkerGlyph::Dot);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(parse_marker_response("").is_none());
        assert!(parse_marker_response("zz\tsda\tdot").is_none());
        assert!(parse_marker_response("3\tsda").is_none());
    }
}
