//! Account values and portfolio positions.
//!
//! The gateway streams a full download of the account first and then sends a
//! download-end marker. Entries received during the download are stored but
//! not reported as new, so a polling reader never sees a half-loaded account
//! as a burst of changes. After the marker every update is reported.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{ManagerConfig, SubscriptionStrategy};
use engine_core::{create_reply_channel, SharedEngine};
use manager_core::{
    classify_diagnostic, handle_unexpected, DiagnosticClass, LatestValue, ManagerError,
    ManagerTask, ReplyHandler, SnapshotStore, Subscriptions, UpdateStatus,
};
use metrics::{create_metrics, SharedMetrics};
use model::{
    AccountValue, AccountValueKey, PortfolioValue, PortfolioValueKey, Reply, Request,
    RequestAccountUpdates, UNMATCHED_REPLY_ID,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const NAME: &str = "account";

type ValueStore = SnapshotStore<AccountValueKey, AccountValue>;
type PortfolioStore = SnapshotStore<PortfolioValueKey, PortfolioValue>;

/// State shared between the manager handle and its control loop.
struct AccountState {
    values: ValueStore,
    portfolio: PortfolioStore,
    update_time: LatestValue<String>,
    loaded: AtomicBool,
}

/// Live view of one account.
pub struct AccountManager {
    account_code: String,
    state: Arc<AccountState>,
    task: ManagerTask,
}

impl AccountManager {
    /// Subscribe to updates for `account_code` and start the manager.
    ///
    /// Fails with [`ManagerError::Startup`] if the subscription request is
    /// rejected; no engine subscription is left behind in that case.
    pub fn new(
        engine: SharedEngine,
        account_code: impl Into<String>,
        config: ManagerConfig,
    ) -> Result<Self, ManagerError> {
        let account_code = account_code.into();
        let (consumer, replies) = create_reply_channel();
        let metrics = create_metrics();
        let state = Arc::new(AccountState {
            values: ValueStore::new(),
            portfolio: PortfolioStore::new(),
            update_time: LatestValue::new(),
            loaded: AtomicBool::new(false),
        });

        let handler = AccountHandler {
            account_code: account_code.clone(),
            state: Arc::clone(&state),
            subscriptions: Subscriptions::new(engine, consumer, metrics.clone()),
            config,
            metrics: metrics.clone(),
        };
        let task = ManagerTask::start(handler, replies, metrics)?;

        Ok(Self {
            account_code,
            state,
            task,
        })
    }

    pub fn account_code(&self) -> &str {
        &self.account_code
    }

    /// Every account value, keyed by account, key and currency.
    pub fn values(&self) -> BTreeMap<AccountValueKey, AccountValue> {
        self.state.values.to_map()
    }

    /// Every portfolio position, keyed by account and contract.
    pub fn portfolio(&self) -> BTreeMap<PortfolioValueKey, PortfolioValue> {
        self.state.portfolio.to_map()
    }

    /// Account values changed since the previous call.
    pub fn new_values(&self) -> Vec<AccountValue> {
        self.state.values.drain_changed()
    }

    /// Portfolio positions changed since the previous call.
    pub fn new_portfolio(&self) -> Vec<PortfolioValue> {
        self.state.portfolio.drain_changed()
    }

    /// Check if the initial download has completed.
    pub fn is_loaded(&self) -> bool {
        self.state.loaded.load(Ordering::SeqCst)
    }

    /// Gateway time of the last account update.
    pub fn last_update_time(&self) -> Option<String> {
        self.state.update_time.get()
    }

    /// Receiver that ticks when account values change or the download completes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.state.values.changes()
    }

    /// Receiver that ticks when portfolio positions change or the download completes.
    pub fn portfolio_changes(&self) -> watch::Receiver<u64> {
        self.state.portfolio.changes()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Number of replies the manager has finished merging.
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

    /// Unsubscribe from account updates and wait for teardown.
    pub async fn close(&self) {
        self.task.close().await;
    }
}

struct AccountHandler {
    account_code: String,
    state: Arc<AccountState>,
    subscriptions: Subscriptions,
    config: ManagerConfig,
    metrics: SharedMetrics,
}

impl AccountHandler {
    fn updates_request(&self, subscribe: bool) -> Request {
        Request::AccountUpdates(RequestAccountUpdates {
            subscribe,
            account_code: self.account_code.clone(),
        })
    }

    fn loaded(&self) -> bool {
        self.state.loaded.load(Ordering::SeqCst)
    }

    fn store<K: Ord + Clone, V: Clone>(
        store: &SnapshotStore<K, V>,
        key: K,
        value: V,
        report: bool,
    ) -> UpdateStatus {
        store.write(|table| {
            table.insert(key.clone(), value);
            if report {
                table.mark_changed(key);
            }
        });
        if report {
            UpdateStatus::Changed
        } else {
            UpdateStatus::NoChange
        }
    }
}

impl ReplyHandler for AccountHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn pre_loop(&mut self) -> Result<(), ManagerError> {
        match self.config.subscription {
            SubscriptionStrategy::PerId => self.subscriptions.subscribe(UNMATCHED_REPLY_ID),
            SubscriptionStrategy::All => self.subscriptions.subscribe_all(),
        };

        let request = self.updates_request(true);
        if let Err(e) = self.subscriptions.engine().send(request) {
            self.subscriptions.release([]);
            return Err(ManagerError::startup(NAME, e));
        }
        info!(manager = NAME, account = %self.account_code, "account updates requested");
        Ok(())
    }

    fn receive(&mut self, reply: Reply) -> Result<UpdateStatus, ManagerError> {
        match reply {
            Reply::AccountValue(value) => {
                let report = self.loaded();
                Ok(Self::store(&self.state.values, value.key.clone(), value, report))
            }
            Reply::PortfolioValue(position) => {
                let report = self.loaded();
                Ok(Self::store(
                    &self.state.portfolio,
                    position.key.clone(),
                    position,
                    report,
                ))
            }
            Reply::AccountUpdateTime(time) => {
                self.state.update_time.set(time.time);
                Ok(UpdateStatus::NoChange)
            }
            Reply::AccountDownloadEnd(end) => {
                if !self.state.loaded.swap(true, Ordering::SeqCst) {
                    info!(
                        manager = NAME,
                        account = %end.account_code,
                        values = self.state.values.len(),
                        positions = self.state.portfolio.len(),
                        "account download complete"
                    );
                }
                self.state.values.notify();
                self.state.portfolio.notify();
                Ok(UpdateStatus::Changed)
            }
            Reply::Diagnostic(diagnostic) => match classify_diagnostic(&diagnostic, &self.config)
            {
                DiagnosticClass::Warning => Ok(UpdateStatus::NoChange),
                DiagnosticClass::Informational => {
                    self.metrics.inc_informational();
                    debug!(manager = NAME, code = diagnostic.code, "informational diagnostic");
                    Ok(UpdateStatus::NoChange)
                }
                DiagnosticClass::Fatal if diagnostic.correlation_id() != UNMATCHED_REPLY_ID => {
                    debug!(
                        manager = NAME,
                        id = diagnostic.id,
                        code = diagnostic.code,
                        "skipping diagnostic for another request"
                    );
                    Ok(UpdateStatus::NoChange)
                }
                DiagnosticClass::Fatal => Err(ManagerError::from(&diagnostic)),
            },
            other @ (Reply::Acknowledgement(_)
            | Reply::Status(_)
            | Reply::Execution(_)
            | Reply::RealtimeBar(_)
            | Reply::Other(_)) => {
                if self.config.subscription == SubscriptionStrategy::All {
                    return Ok(UpdateStatus::NoChange);
                }
                handle_unexpected(self.config.unexpected_reply, NAME, &other)
            }
        }
    }

    fn pre_destroy(&mut self) {
        let request = self.updates_request(false);
        if let Err(e) = self.subscriptions.engine().send(request) {
            warn!(manager = NAME, account = %self.account_code, error = %e, "failed to cancel account updates");
        }
        self.subscriptions.release([]);
        info!(manager = NAME, account = %self.account_code, "account updates released");
    }
}
