//! Stall detector for blocking reads
//!
//! The decode worker and the enrichment bridge both block legitimately — on
//! wire channels waiting for capture data, and on the subprocess pipe waiting
//! for a reply. Neither gets a read timeout, so a wedged enrichment process
//! or a stalled capture source shows up as silence. The watchdog makes that
//! silence visible: each blocking site stamps an atomic timestamp around the
//! operation, and a scan thread warns when one has been stuck too long.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const STALL_THRESHOLD: Duration = Duration::from_secs(5);
const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Milliseconds since UNIX_EPOCH.
#[inline(always)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Tracking state for a single blocking site.
struct SiteState {
    /// When the in-flight operation started (ms since epoch), 0 when idle.
    op_start: AtomicU64,
    /// Set once a warning has been emitted for the in-flight operation.
    has_warned: AtomicBool,
    subsystem: String,
    operation: String,
}

/// Handle held by the code that blocks; cheap to clone.
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<SiteState>,
}

impl WatchdogHandle {
    #[inline(always)]
    fn start_operation(&self) {
        self.state.op_start.store(now_millis(), Ordering::Relaxed);
        self.state.has_warned.store(false, Ordering::Relaxed);
    }

    #[inline(always)]
    fn finish_operation(&self) {
        if self.state.has_warned.load(Ordering::Relaxed) {
            info!(
                subsystem = %self.state.subsystem,
                operation = %self.state.operation,
                "stalled operation completed"
            );
            self.state.has_warned.store(false, Ordering::Relaxed);
        }
        self.state.op_start.store(0, Ordering::Relaxed);
    }
}

/// Registry of blocking sites plus the scan loop.
#[derive(Clone)]
pub struct Watchdog {
    sites: Arc<Mutex<Vec<Weak<SiteState>>>>,
    running: Arc<AtomicBool>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            sites: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Register a blocking site for monitoring.
    pub fn register(&self, subsystem: &str, operation: &str) -> WatchdogHandle {
        let state = Arc::new(SiteState {
            op_start: AtomicU64::new(0),
            has_warned: AtomicBool::new(false),
            subsystem: subsystem.to_string(),
            operation: operation.to_string(),
        });
        self.sites.lock().unwrap().push(Arc::downgrade(&state));
        WatchdogHandle { state }
    }

    /// Scan all live sites, warning once per operation stuck past the
    /// threshold. Dead sites are pruned as a side effect.
    pub fn check(&self) {
        let now = now_millis();
        let threshold_ms = STALL_THRESHOLD.as_millis() as u64;

        let mut sites = self.sites.lock().unwrap();
        sites.retain(|weak| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let start = state.op_start.load(Ordering::Relaxed);
            if start > 0 {
                let stalled_ms = now.saturating_sub(start);
                if stalled_ms > threshold_ms && !state.has_warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        subsystem = %state.subsystem,
                        operation = %state.operation,
                        stalled_secs = stalled_ms as f64 / 1000.0,
                        "blocking operation has stalled"
                    );
                }
            }
            true
        });
    }

    /// Spawn the scan thread. It runs until [`stop`](Self::stop) is called.
    pub fn spawn_monitor(&self) -> std::thread::JoinHandle<()> {
        let watchdog = self.clone();
        std::thread::spawn(move || {
            while watchdog.running.load(Ordering::Relaxed) {
                std::thread::sleep(SCAN_INTERVAL);
                watchdog.check();
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard around one blocking operation. Two atomic stores, no locks.
pub struct OperationGuard<'a> {
    handle: &'a WatchdogHandle,
}

impl<'a> OperationGuard<'a> {
    #[inline(always)]
    pub fn new(handle: &'a WatchdogHandle) -> Self {
        handle.start_operation();
        Self { handle }
    }
}

impl Drop for OperationGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.handle.finish_operation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_clears_timestamp() {
        let wd = Watchdog::new();
        let handle = wd.register("test", "recv");
        {
            let _guard = OperationGuard::new(&handle);
            assert!(handle.state.op_start.load(Ordering::Relaxed) > 0);
        }
        assert_eq!(handle.state.op_start.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_check_prunes_dead_sites() {
        let wd = Watchdog::new();
        let handle = wd.register("test", "recv");
        assert_eq!(wd.sites.lock().unwrap().len(), 1);
        drop(handle);
        wd.check();
        assert_eq!(wd.sites.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_idle_site_never_warns() {
        let wd = Watchdog::new();
        let handle = wd.register("test", "recv");
        wd.check();
        assert!(!handle.state.has_warned.load(Ordering::Relaxed));
    }
}
