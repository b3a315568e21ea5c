//! Enrichment process lifecycle and request/response exchange

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::watchdog::{OperationGuard, Watchdog, WatchdogHandle};
use crate::{Error, Result};

use super::wire::{
    self, encode_feature_query, encode_marker_query, parse_marker_response, FeatureCategory,
    MarkerQuery, MarkerResponse,
};

/// Line transport to the enrichment process.
///
/// Split out as a trait so the exchange logic can run against scripted
/// transports in tests; production code always uses the stdin/stdout pipes
/// of a spawned child.
pub trait LineIo: Send {
    /// Write one line, terminator included, and flush it.
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    /// Read one line, terminator stripped. `None` means the peer closed its
    /// output. No timeout: enrichment processes may take as long as they
    /// need, and the watchdog surfaces ones that have wedged.
    fn recv_line(&mut self) -> io::Result<Option<String>>;
}

struct PipeIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl LineIo for PipeIo {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()
    }

    fn recv_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        if self.stdout.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }
}

/// Connection to a running enrichment process.
///
/// Feature support is negotiated once at startup. Marker exchanges happen
/// per frame under a single lock so concurrent callers can never interleave
/// their lines; a failed exchange permanently disables markers rather than
/// failing the decode.
pub struct EnrichmentBridge {
    io: Mutex<Box<dyn LineIo>>,
    child: Option<Child>,
    bubble: bool,
    tabular: bool,
    markers: AtomicBool,
    watchdog: Watchdog,
    monitor: Option<std::thread::JoinHandle<()>>,
    read_guard: WatchdogHandle,
}

impl EnrichmentBridge {
    /// Spawn `command` (split shell-style into program + arguments) with
    /// piped stdin/stdout and negotiate features with it.
    pub fn start(command: &str) -> Result<Self> {
        let words = shell_words::split(command)
            .map_err(|e| Error::Config(format!("bad enrichment command: {e}")))?;
        let (program, args) = words
            .split_first()
            .ok_or_else(|| Error::Config("empty enrichment command".to_string()))?;

        info!(program = %program, "starting enrichment process");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        // both pipes were requested just above
        let stdin = child.stdin.take().ok_or(Error::EnrichmentClosed)?;
        let stdout = child.stdout.take().ok_or(Error::EnrichmentClosed)?;
        let io = PipeIo {
            stdin,
            stdout: BufReader::new(stdout),
        };
        Self::negotiate(Box::new(io), Some(child))
    }

    /// Build a bridge over an arbitrary transport. Used by tests; `start`
    /// is the production path.
    pub fn over_io(io: Box<dyn LineIo>) -> Result<Self> {
        Self::negotiate(io, None)
    }

    fn negotiate(mut io: Box<dyn LineIo>, child: Option<Child>) -> Result<Self> {
        let watchdog = Watchdog::new();
        let monitor = watchdog.spawn_monitor();
        let read_guard = watchdog.register("enrichment", "recv");

        let mut enabled = [false; 3];
        let outcome: Result<()> = (|| {
            for (slot, category) in enabled.iter_mut().zip(FeatureCategory::ALL) {
                io.send_line(&encode_feature_query(category))?;
                let reply = {
                    let _guard = OperationGuard::new(&read_guard);
                    io.recv_line()?
                }
                .ok_or(Error::EnrichmentClosed)?;
                // only an exact "no" opts out
                *slot = reply != wire::FEATURE_DISABLED_REPLY;
                debug!(category = category.name(), enabled = *slot, "feature negotiated");
            }
            Ok(())
        })();
        if let Err(e) = outcome {
            watchdog.stop();
            let _ = monitor.join();
            return Err(e);
        }
        let [bubble, markers, tabular] = enabled;

        Ok(Self {
            io: Mutex::new(io),
            child,
            bubble,
            tabular,
            markers: AtomicBool::new(markers),
            watchdog,
            monitor: Some(monitor),
            read_guard,
        })
    }

    pub fn bubble_enabled(&self) -> bool {
        self.bubble
    }

    pub fn tabular_enabled(&self) -> bool {
        self.tabular
    }

    pub fn markers_enabled(&self) -> bool {
        self.markers.load(Ordering::Relaxed)
    }

    /// Stop offering frames for marker enrichment. Called after a failed
    /// exchange; there is no way back within a capture.
    pub fn disable_markers(&self) {
        self.markers.store(false, Ordering::Relaxed);
    }

    /// Send one frame's marker query and collect response lines until the
    /// blank terminator. Malformed lines are skipped, not fatal.
    pub fn request_markers(&self, query: &MarkerQuery) -> Result<Vec<MarkerResponse>> {
        // one lock for the whole exchange; interleaved exchanges would
        // corrupt the line framing
        let mut io = self.io.lock().unwrap();
        io.send_line(&encode_marker_query(query))?;

        let mut responses = Vec::new();
        loop {
            let line = {
                let _guard = OperationGuard::new(&self.read_guard);
                io.recv_line()?
            }
            .ok_or(Error::EnrichmentClosed)?;
            if line.is_empty() {
                break;
            }
            match parse_marker_response(&line) {
                Some(response) => responses.push(response),
                None => debug!(line = %line, "unparsable marker response line, skipping"),
            }
        }
        Ok(responses)
    }

    /// Close the transport and reap the child. A well-behaved process exits
    /// on stdin EOF; anything still running afterwards is killed.
    pub fn shutdown(self) {
        let EnrichmentBridge {
            io,
            child,
            watchdog,
            monitor,
            ..
        } = self;
        drop(io);
        if let Some(mut child) = child {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!(%status, "enrichment process exited"),
                Err(e) => warn!(error = %e, "failed to reap enrichment process"),
            }
        }
        watchdog.stop();
        if let Some(monitor) = monitor {
            let _ = monitor.join();
        }
    }
}

/// Scripted transport for exercising the bridge without a subprocess.
#[doc(hidden)]
pub struct ScriptedIo {
    replies: VecDeque<String>,
    sent: std::sync::Arc<Mutex<Vec<String>>>,
}

#[doc(hidden)]
impl ScriptedIo {
    /// `replies` are returned one per `recv_line` call; after they run out
    /// the transport reports EOF. The returned handle observes every line
    /// sent to the transport.
    pub fn new<I, T>(replies: I) -> (Self, std::sync::Arc<Mutex<Vec<String>>>)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let sent = std::sync::Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                replies: replies.into_iter().map(Into::into).collect(),
                sent: sent.clone(),
            },
            sent,
        )
    }
}

impl LineIo for ScriptedIo {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn recv_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.replies.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_with(replies: Vec<&str>) -> (EnrichmentBridge, std::sync::Arc<Mutex<Vec<String>>>) {
        let (io, sent) = ScriptedIo::new(replies);
        let bridge = EnrichmentBridge::over_io(Box::new(io)).unwrap();
        (bridge, sent)
    }

    #[test]
    fn test_feature_negotiation_order_and_queries() {
        let (bridge, sent) = bridge_with(vec!["yes", "yes", "no"]);
        assert!(bridge.bubble_enabled());
        assert!(bridge.markers_enabled());
        assert!(!bridge.tabular_enabled());
        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                "FEATURE\tbubble\n".to_string(),
                "FEATURE\tmarker\n".to_string(),
                "FEATURE\ttabular\n".to_string(),
            ]
        );
        bridge.shutdown();
    }

    #[test]
    fn test_only_exact_no_disables_a_feature() {
        let (bridge, _) = bridge_with(vec!["NO", "nope", ""]);
        assert!(bridge.bubble_enabled());
        assert!(bridge.markers_enabled());
        assert!(bridge.tabular_enabled());
        bridge.shutdown();
    }

    #[test]
    fn test_eof_during_negotiation_fails() {
        let (io, _) = ScriptedIo::new(vec!["yes"]);
        assert!(matches!(
            EnrichmentBridge::over_io(Box::new(io)),
            Err(Error::EnrichmentClosed)
        ));
    }

    #[test]
    fn test_marker_exchange_collects_until_blank_line() {
        let (bridge, sent) = bridge_with(vec![
            "yes",
            "yes",
            "yes",
            "0\tsda\tsquare",
            "not a marker line",
            "7\tsda\terrorx",
            "",
        ]);
        let query = MarkerQuery {
            packet_id: Some(2),
            frame_index: 5,
            bit_count: 8,
            start_sample: 0x100,
            end_sample: 0x200,
            frame_kind: 1,
            frame_flags: 0x01,
            value: 0x3c,
        };
        let responses = bridge.request_markers(&query).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].bit_index, 0);
        assert_eq!(responses[1].bit_index, 7);
        assert_eq!(
            sent.lock().unwrap().last().unwrap(),
            "MARKER\t2\t5\t8\t100\t200\t1\t1\t3c\t0\n"
        );
        bridge.shutdown();
    }

    #[test]
    fn test_eof_mid_exchange_is_an_error() {
        let (bridge, _) = bridge_with(vec!["yes", "yes", "yes", "0\tsda\tdot"]);
        let query = MarkerQuery {
            packet_id: None,
            frame_index: 0,
            bit_count: 8,
            start_sample: 0,
            end_sample: 1,
            frame_kind: 0,
            frame_flags: 1,
            value: 0,
        };
        assert!(matches!(
            bridge.request_markers(&query),
            Err(Error::EnrichmentClosed)
        ));
        // the caller reacts by disabling markers
        bridge.disable_markers();
        assert!(!bridge.markers_enabled());
        bridge.shutdown();
    }

    #[test]
    fn test_empty_command_is_a_config_error() {
        assert!(matches!(
            EnrichmentBridge::start("   "),
            Err(Error::Config(_))
        ));
    }
}
