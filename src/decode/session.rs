//! Worker-thread wrapper around the decoder
//!
//! A session runs an [`I2cDecoder`] on its own thread, the same way a
//! capture front end would: the cursors suspend the worker whenever sample
//! data lags, and a cancel flag lets the owner stop the worker between
//! bytes without tearing the channels down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;

use crate::signal::SignalCursor;
use crate::{Error, Result};

use super::i2c::I2cDecoder;
use super::sink::MemorySink;
use super::types::{Frame, Marker};

/// Everything a finished decode produced.
#[derive(Debug)]
pub struct DecodeSummary {
    pub frames: Vec<Frame>,
    pub markers: Vec<Marker>,
    /// Packets closed by bus conditions during the capture.
    pub packets: u64,
}

/// A decode running on a dedicated worker thread.
pub struct DecodeSession {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Result<DecodeSummary>>,
}

impl DecodeSession {
    /// Move `decoder` onto a new worker thread and start decoding.
    pub fn spawn<C>(decoder: I2cDecoder<C, MemorySink>) -> Self
    where
        C: SignalCursor + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = std::thread::Builder::new()
            .name("i2c-decode".to_string())
            .spawn(move || {
                let mut decoder = decoder;
                let outcome = decoder.run(&flag);
                let (frames, markers, packets) = decoder.into_sink().into_parts();
                debug!(
                    frames = frames.len(),
                    markers = markers.len(),
                    packets,
                    "decode worker finished"
                );
                outcome.map(|()| DecodeSummary {
                    frames,
                    markers,
                    packets,
                })
            })
            .unwrap_or_else(|e| panic!("failed to spawn decode worker: {e}"));
        Self { cancel, handle }
    }

    /// Ask the worker to stop after the byte currently in flight. Safe to
    /// call any number of times, from any thread.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and collect its results.
    pub fn join(self) -> Result<DecodeSummary> {
        self.handle.join().map_err(|_| Error::WorkerPanic)?
    }
}
