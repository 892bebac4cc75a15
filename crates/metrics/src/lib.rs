use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for one manager's control loop.
#[derive(Debug)]
pub struct ManagerMetrics {
    // Counters
    replies_received: AtomicU64,
    changes_applied: AtomicU64,
    warnings_swallowed: AtomicU64,
    informational: AtomicU64,
    fatal_errors: AtomicU64,
    unsubscribes: AtomicU64,

    stopped: AtomicBool,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_reply_time: Option<Instant>,
    last_change_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self {
            replies_received: AtomicU64::new(0),
            changes_applied: AtomicU64::new(0),
            warnings_swallowed: AtomicU64::new(0),
            informational: AtomicU64::new(0),
            fatal_errors: AtomicU64::new(0),
            unsubscribes: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_reply_time: None,
                last_change_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_replies_received(&self) {
        self.replies_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_reply_time = Some(Instant::now());
    }

    pub fn inc_changes_applied(&self) {
        self.changes_applied.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_change_time = Some(Instant::now());
    }

    pub fn inc_warnings_swallowed(&self) {
        self.warnings_swallowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_informational(&self) {
        self.informational.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fatal_errors(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_unsubscribes(&self) {
        self.unsubscribes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    // --- Getter methods ---

    pub fn replies_received(&self) -> u64 {
        self.replies_received.load(Ordering::Relaxed)
    }

    pub fn changes_applied(&self) -> u64 {
        self.changes_applied.load(Ordering::Relaxed)
    }

    pub fn warnings_swallowed(&self) -> u64 {
        self.warnings_swallowed.load(Ordering::Relaxed)
    }

    pub fn informational(&self) -> u64 {
        self.informational.load(Ordering::Relaxed)
    }

    pub fn fatal_errors(&self) -> u64 {
        self.fatal_errors.load(Ordering::Relaxed)
    }

    pub fn unsubscribes(&self) -> u64 {
        self.unsubscribes.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_reply(&self) -> Option<f64> {
        self.inner
            .read()
            .last_reply_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_change(&self) -> Option<f64> {
        self.inner
            .read()
            .last_change_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            replies_received: self.replies_received(),
            changes_applied: self.changes_applied(),
            warnings_swallowed: self.warnings_swallowed(),
            informational: self.informational(),
            fatal_errors: self.fatal_errors(),
            unsubscribes: self.unsubscribes(),
            stopped: self.is_stopped(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_reply: self.secs_since_last_reply(),
            secs_since_last_change: self.secs_since_last_change(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub replies_received: u64,
    pub changes_applied: u64,
    pub warnings_swallowed: u64,
    pub informational: u64,
    pub fatal_errors: u64,
    pub unsubscribes: u64,
    pub stopped: bool,
    pub uptime_secs: f64,
    pub secs_since_last_reply: Option<f64>,
    pub secs_since_last_change: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Control loop running, no fatal error.
    Healthy,
    /// Control loop stopped on a fatal reply error.
    Failed,
    /// Control loop stopped on request.
    Stopped,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Failed => write!(f, "FAILED"),
            HealthStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl MetricsSnapshot {
    /// Determine the health status based on metrics.
    pub fn health_status(&self) -> HealthStatus {
        if self.fatal_errors > 0 {
            HealthStatus::Failed
        } else if self.stopped {
            HealthStatus::Stopped
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Manager Metrics ===")?;
        writeln!(f, "Status:              {}", self.health_status())?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Replies received:    {}", self.replies_received)?;
        writeln!(f, "Changes applied:     {}", self.changes_applied)?;
        writeln!(f, "Warnings swallowed:  {}", self.warnings_swallowed)?;
        writeln!(f, "Informational:       {}", self.informational)?;
        writeln!(f, "Fatal errors:        {}", self.fatal_errors)?;
        writeln!(f, "Unsubscribes:        {}", self.unsubscribes)?;
        if let Some(secs) = self.secs_since_last_reply {
            writeln!(f, "Since last reply:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_change {
            writeln!(f, "Since last change:   {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<ManagerMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(ManagerMetrics::new())
}
