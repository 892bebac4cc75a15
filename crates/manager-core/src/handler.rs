//! The three callbacks every manager supplies to the control loop.

use common::{ManagerConfig, UnexpectedReplyPolicy};
use model::{Diagnostic, Reply};
use tracing::debug;

use crate::error::ManagerError;

/// Outcome of merging one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The reply did not change any state a reader can observe.
    NoChange,
    /// The reply changed state; pending-change bookkeeping is already updated.
    Changed,
}

/// Manager-specific behavior driven by [`crate::ManagerTask`].
///
/// # Lifecycle
///
/// 1. `pre_loop` - called once, on the constructing task, before the loop is spawned
/// 2. `receive` - called for each reply, one at a time, on the manager's own task
/// 3. `pre_destroy` - called once when the loop exits for any reason
///
/// `receive` must not block on I/O. Returning `Err` stops the loop; the error
/// is latched for the application to read.
pub trait ReplyHandler: Send + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Subscribe and send whatever initial requests the manager needs.
    ///
    /// On failure the handler must release anything it already acquired.
    fn pre_loop(&mut self) -> Result<(), ManagerError>;

    /// Merge one reply.
    fn receive(&mut self, reply: Reply) -> Result<UpdateStatus, ManagerError>;

    /// Release subscriptions and send any teardown requests.
    fn pre_destroy(&mut self);
}

/// How an error-or-warning diagnostic should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticClass {
    /// Severity-warning; absorbed.
    Warning,
    /// Error-severity but harmless, such as a cancellation confirmation; absorbed with a log note.
    Informational,
    /// Anything else; stops the loop.
    Fatal,
}

/// Classify a diagnostic under `config`.
pub fn classify_diagnostic(diagnostic: &Diagnostic, config: &ManagerConfig) -> DiagnosticClass {
    if diagnostic.is_warning() {
        DiagnosticClass::Warning
    } else if config.is_cancel_ack(diagnostic.code) {
        DiagnosticClass::Informational
    } else {
        DiagnosticClass::Fatal
    }
}

/// Apply `policy` to a reply the manager has no rule for.
pub fn handle_unexpected(
    policy: UnexpectedReplyPolicy,
    manager: &str,
    reply: &Reply,
) -> Result<UpdateStatus, ManagerError> {
    match policy {
        UnexpectedReplyPolicy::Fatal => Err(ManagerError::UnexpectedReply(format!(
            "{} (id {})",
            reply.kind(),
            reply.reply_id()
        ))),
        UnexpectedReplyPolicy::Ignore => {
            debug!(manager = %manager, kind = reply.kind(), "ignoring unexpected reply");
            Ok(UpdateStatus::NoChange)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::OpaqueReply;

    #[test]
    fn test_classify_diagnostic() {
        let config = ManagerConfig::default();

        assert_eq!(
            classify_diagnostic(&Diagnostic::new(-1, 2104, "farm OK"), &config),
            DiagnosticClass::Warning
        );
        assert_eq!(
            classify_diagnostic(&Diagnostic::new(7, 202, "Order Canceled"), &config),
            DiagnosticClass::Informational
        );
        assert_eq!(
            classify_diagnostic(&Diagnostic::new(7, 201, "Order rejected"), &config),
            DiagnosticClass::Fatal
        );
    }

    #[test]
    fn test_handle_unexpected() {
        let reply = Reply::Other(OpaqueReply {
            id: Some(3),
            kind: "scanner_data".into(),
        });

        assert_eq!(
            handle_unexpected(UnexpectedReplyPolicy::Ignore, "bars", &reply),
            Ok(UpdateStatus::NoChange)
        );
        assert_eq!(
            handle_unexpected(UnexpectedReplyPolicy::Fatal, "orders", &reply),
            Err(ManagerError::UnexpectedReply("scanner_data (id 3)".into()))
        );
    }
}
