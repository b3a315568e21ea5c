//! Per-wire signal representation and cursors
//!
//! A capture is one transition stream per wire, run-length encoded: only the
//! samples where a wire changes level are recorded. Cursors replay such a
//! stream strictly forward, tracking the current level and sample position.

mod channel;
mod cursor;
mod transition;

pub use channel::{wire_channel, ChannelCursor, TransitionSender, WireEvent};
pub use cursor::{ReplayCursor, SignalCursor};
pub use transition::{Level, Transition};
