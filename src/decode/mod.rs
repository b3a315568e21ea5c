//! I2C frame decoding
//!
//! [`I2cDecoder`] turns the two wire cursors into a stream of byte frames and
//! display markers, delivered through a [`ResultsSink`]. [`DecodeSession`]
//! wraps the decoder in a worker thread with cooperative cancellation.

mod i2c;
mod session;
mod sink;
mod types;

pub use i2c::I2cDecoder;
pub use session::{DecodeSession, DecodeSummary};
pub use sink::{MemorySink, ResultsSink};
pub use types::{AckStatus, Frame, FrameKind, Marker, MarkerGlyph, Wire};
