//! Latest bar of a realtime bar stream.

use std::sync::Arc;

use common::{ManagerConfig, SubscriptionStrategy};
use engine_core::{create_reply_channel, SharedEngine};
use manager_core::{
    handle_unexpected, LatestValue, ManagerError, ManagerTask, ReplyHandler, Subscriptions,
    UpdateStatus,
};
use metrics::{create_metrics, SharedMetrics};
use model::{CancelRealtimeBars, RealtimeBar, Reply, Request, RequestId, RequestRealtimeBars};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

const NAME: &str = "realtime_bars";

/// Holds the most recent bar of one stream. Earlier bars are not kept.
pub struct RealtimeBarManager {
    request_id: RequestId,
    symbol: String,
    bar: Arc<LatestValue<RealtimeBar>>,
    task: ManagerTask,
}

impl RealtimeBarManager {
    /// Request a bar stream and start holding its latest bar.
    ///
    /// The request id is allocated from the engine; any id already set on
    /// `request` is replaced.
    pub fn new(
        engine: SharedEngine,
        mut request: RequestRealtimeBars,
        config: ManagerConfig,
    ) -> Result<Self, ManagerError> {
        request.request_id = engine.next_request_id();
        let request_id = request.request_id;
        let symbol = request.symbol.clone();

        let (consumer, replies) = create_reply_channel();
        let metrics = create_metrics();
        let bar = Arc::new(LatestValue::new());

        let handler = BarHandler {
            request: Some(request),
            request_id,
            bar: Arc::clone(&bar),
            subscriptions: Subscriptions::new(engine, consumer, metrics.clone()),
            config,
        };
        let task = ManagerTask::start(handler, replies, metrics)?;

        Ok(Self {
            request_id,
            symbol,
            bar,
            task,
        })
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The latest bar, or `None` before the first one arrives.
    pub fn item(&self) -> Option<RealtimeBar> {
        self.bar.get()
    }

    /// Receiver that ticks on every new bar.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.bar.changes()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Number of replies the manager has finished handling.
    pub fn processed(&self) -> u64 {
        self.task.processed()
    }

    pub fn error(&self) -> Option<ManagerError> {
        self.task.error()
    }

    pub fn errors(&self) -> watch::Receiver<Option<ManagerError>> {
        self.task.errors()
    }

    pub fn metrics(&self) -> &SharedMetrics {
        self.task.metrics()
    }

    pub fn stop(&self) {
        self.task.stop();
    }

    /// Cancel the stream and wait for teardown.
    pub async fn close(&self) {
        self.task.close().await;
    }
}

struct BarHandler {
    request: Option<RequestRealtimeBars>,
    request_id: RequestId,
    bar: Arc<LatestValue<RealtimeBar>>,
    subscriptions: Subscriptions,
    config: ManagerConfig,
}

impl ReplyHandler for BarHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn pre_loop(&mut self) -> Result<(), ManagerError> {
        match self.config.subscription {
            SubscriptionStrategy::PerId => self.subscriptions.subscribe(self.request_id),
            SubscriptionStrategy::All => self.subscriptions.subscribe_all(),
        };

        let Some(request) = self.request.take() else {
            return Ok(());
        };
        let symbol = request.symbol.clone();
        if let Err(e) = self
            .subscriptions
            .engine()
            .send(Request::RealtimeBars(request))
        {
            self.subscriptions.release([]);
            return Err(ManagerError::startup(NAME, e));
        }
        info!(manager = NAME, request_id = self.request_id, symbol = %symbol, "bar stream requested");
        Ok(())
    }

    fn receive(&mut self, reply: Reply) -> Result<UpdateStatus, ManagerError> {
        match reply {
            Reply::RealtimeBar(bar) if bar.request_id == self.request_id => {
                trace!(manager = NAME, request_id = bar.request_id, time = bar.time, close = %bar.close, "bar");
                self.bar.set(bar);
                Ok(UpdateStatus::Changed)
            }
            Reply::Diagnostic(diagnostic) if diagnostic.id == self.request_id => {
                if diagnostic.is_warning() {
                    return Ok(UpdateStatus::NoChange);
                }
                Err(ManagerError::from(&diagnostic))
            }
            other => {
                if self.config.subscription == SubscriptionStrategy::All {
                    return Ok(UpdateStatus::NoChange);
                }
                handle_unexpected(self.config.unexpected_reply, NAME, &other)
            }
        }
    }

    fn pre_destroy(&mut self) {
        let cancel = Request::CancelRealtimeBars(CancelRealtimeBars {
            request_id: self.request_id,
        });
        if let Err(e) = self.subscriptions.engine().send(cancel) {
            warn!(manager = NAME, request_id = self.request_id, error = %e, "failed to cancel bar stream");
        }
        self.subscriptions.release([]);
        debug!(manager = NAME, request_id = self.request_id, "bar stream released");
    }
}
