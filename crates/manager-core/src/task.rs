//! The control loop shared by every manager.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use engine_core::ReplyReceiver;
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use model::Reply;
use tracing::{debug, error, info, trace, warn};

use crate::error::ManagerError;
use crate::handler::{ReplyHandler, UpdateStatus};

type ErrorLatch = Arc<watch::Sender<Option<ManagerError>>>;

/// Loop progress shared with the handle.
#[derive(Debug)]
struct LoopState {
    running: AtomicBool,
    processed: AtomicU64,
}

/// Handle to a running control loop.
///
/// The loop runs on its own tokio task, pulling replies one at a time and
/// handing them to the handler. It exits when [`ManagerTask::stop`] or
/// [`ManagerTask::close`] is called, when the handler returns an error, or
/// when the reply queue closes. Teardown runs exactly once in every case.
/// Dropping the handle requests a stop without waiting for it.
pub struct ManagerTask {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    errors: ErrorLatch,
    state: Arc<LoopState>,
    metrics: SharedMetrics,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerTask {
    /// Run `pre_loop` and, if it succeeds, spawn the loop.
    ///
    /// Must be called from within a tokio runtime. A `pre_loop` failure is
    /// returned as is and no task is spawned.
    pub fn start<H: ReplyHandler>(
        mut handler: H,
        replies: ReplyReceiver,
        metrics: SharedMetrics,
    ) -> Result<Self, ManagerError> {
        let name = handler.name().to_string();

        if let Err(e) = handler.pre_loop() {
            error!(manager = %name, error = %e, "manager startup failed");
            metrics.mark_stopped();
            return Err(e);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (error_tx, _) = watch::channel(None);
        let errors = Arc::new(error_tx);
        let state = Arc::new(LoopState {
            running: AtomicBool::new(true),
            processed: AtomicU64::new(0),
        });

        let join = tokio::spawn(run_loop(
            handler,
            replies,
            shutdown_rx,
            Arc::clone(&errors),
            Arc::clone(&state),
            Arc::clone(&metrics),
        ));

        info!(manager = %name, "manager started");

        Ok(Self {
            name,
            shutdown_tx,
            errors,
            state,
            metrics,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request a cooperative stop. Returns immediately.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Request a stop and wait until teardown has finished.
    pub async fn close(&self) {
        self.stop();
        let handle = self.join.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(manager = %self.name, error = %e, "manager task ended abnormally");
            }
        }
    }

    /// Check if the loop is still processing replies.
    ///
    /// Turns `false` only after teardown has finished.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Number of replies the loop has finished handling, warnings included.
    ///
    /// Everything a handled reply changed is visible to readers once this
    /// count covers it.
    pub fn processed(&self) -> u64 {
        self.state.processed.load(Ordering::Acquire)
    }

    /// The fatal error that stopped the loop, if any.
    pub fn error(&self) -> Option<ManagerError> {
        self.errors.borrow().clone()
    }

    /// Receiver that fires when a fatal error is latched.
    ///
    /// If the error is already latched, the receiver starts out changed, so
    /// `changed().await` returns at once.
    pub fn errors(&self) -> watch::Receiver<Option<ManagerError>> {
        let mut rx = self.errors.subscribe();
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        rx
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}

impl Drop for ManagerTask {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

async fn run_loop<H: ReplyHandler>(
    mut handler: H,
    mut replies: ReplyReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
    errors: ErrorLatch,
    state: Arc<LoopState>,
    metrics: SharedMetrics,
) {
    let name = handler.name().to_string();
    debug!(manager = %name, "manager loop running");

    loop {
        tokio::select! {
            biased;

            // Close request (highest priority)
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(manager = %name, "close requested");
                    break;
                }
            }

            reply = replies.recv() => {
                let Some(reply) = reply else {
                    warn!(manager = %name, "reply queue closed");
                    break;
                };
                metrics.inc_replies_received();
                let failed = match handle_reply(&mut handler, &name, reply, &metrics) {
                    Ok(()) => false,
                    Err(e) => {
                        errors.send_replace(Some(e));
                        true
                    }
                };
                state.processed.fetch_add(1, Ordering::Release);
                if failed {
                    break;
                }
            }
        }
    }

    handler.pre_destroy();
    metrics.mark_stopped();
    state.running.store(false, Ordering::Release);
    info!(
        manager = %name,
        replies = metrics.replies_received(),
        changes = metrics.changes_applied(),
        health = %metrics.snapshot().health_status(),
        "manager stopped"
    );
}

fn handle_reply<H: ReplyHandler>(
    handler: &mut H,
    name: &str,
    reply: Reply,
    metrics: &SharedMetrics,
) -> Result<(), ManagerError> {
    if let Some(warning) = reply.as_warning() {
        metrics.inc_warnings_swallowed();
        debug!(
            manager = %name,
            id = warning.id,
            code = warning.code,
            message = %warning.message,
            "gateway warning"
        );
        return Ok(());
    }

    let id = reply.reply_id();
    match handler.receive(reply) {
        Ok(UpdateStatus::Changed) => {
            metrics.inc_changes_applied();
            trace!(manager = %name, id, "reply merged");
            Ok(())
        }
        Ok(UpdateStatus::NoChange) => Ok(()),
        Err(e) => {
            error!(manager = %name, id, error = %e, "fatal reply error, stopping");
            metrics.inc_fatal_errors();
            Err(e)
        }
    }
}
