//! Enrichable I2C decoder with a streaming cursor API
//!
//! This library decodes a two-wire I2C capture (SDA + SCL) from run-length
//! encoded transition streams into frames, bus-condition markers, and display
//! markers, optionally enriching each frame through an external process that
//! speaks a line-oriented text protocol on its stdin/stdout.
//!
//! # Architecture
//!
//! - **Signal cursors**: forward-only, transition-granularity views over one
//!   wire each, backed either by a crossbeam channel (live captures) or an
//!   in-memory transition list (simulation, tests)
//! - **I2cDecoder**: the bit/byte/frame state machine, usually run on a
//!   dedicated worker thread that suspends inside the cursors when sample
//!   data lags behind the decoder
//! - **EnrichmentBridge**: feature negotiation plus a per-frame
//!   request/response exchange with a user-supplied subprocess
//!
//! # Example
//!
//! ```
//! use i2c_enrich::decode::{I2cDecoder, MemorySink};
//! use i2c_enrich::sim::{AckReply, WaveformBuilder};
//! use std::sync::atomic::AtomicBool;
//!
//! let mut wave = WaveformBuilder::new(40);
//! wave.start();
//! wave.byte(0xa5, AckReply::Ack);
//! wave.stop();
//! let (sda, scl) = wave.into_cursors();
//!
//! let mut decoder = I2cDecoder::new(sda, scl, MemorySink::new());
//! decoder.run(&AtomicBool::new(false))?;
//! assert_eq!(decoder.sink().frames().len(), 1);
//! # Ok::<(), i2c_enrich::Error>(())
//! ```

use thiserror::Error;

pub mod config;
pub mod decode;
pub mod enrich;
pub mod signal;
pub mod sim;
pub mod watchdog;

pub use config::{AddressDisplay, AnalyzerConfig};
pub use decode::{
    AckStatus, DecodeSession, DecodeSummary, Frame, FrameKind, I2cDecoder, Marker, MarkerGlyph,
    MemorySink, ResultsSink, Wire,
};
pub use enrich::EnrichmentBridge;
pub use signal::{ChannelCursor, Level, ReplayCursor, SignalCursor, Transition, TransitionSender};

#[derive(Error, Debug)]
pub enum Error {
    /// The capture ended. Not a fault, just nothing left to decode.
    #[error("end of capture")]
    EndOfCapture,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("enrichment I/O error: {0}")]
    Enrichment(#[from] std::io::Error),

    #[error("enrichment process closed its output mid-exchange")]
    EnrichmentClosed,

    #[error("decode worker panicked")]
    WorkerPanic,
}

pub type Result<T> = std::result::Result<T, Error>;
