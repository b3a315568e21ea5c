//! Frame enrichment through an external process
//!
//! An enrichment process is any executable that reads queries on stdin and
//! answers on stdout, one line per message, fields separated by tabs, all
//! numbers in lowercase hex. The bridge negotiates which features the
//! process supports at startup, then offers every decoded frame for extra
//! display markers.

mod subprocess;
mod wire;

pub use subprocess::{EnrichmentBridge, LineIo, ScriptedIo};
pub use wire::{
    encode_feature_query, encode_marker_query, parse_marker_response, FeatureCategory,
    MarkerQuery, MarkerResponse,
};
