//! Generic reply-aggregation framework.
//!
//! Every manager is a [`ReplyHandler`] driven by a [`ManagerTask`]:
//!
//! ```text
//! engine ──► reply queue ──► ManagerTask loop ──► handler.receive()
//!                                                      │
//!                                      SnapshotStore ◄─┘ (exclusive lock)
//!                                            │
//! application ◄── all() / drain_changed() ◄──┘ (shared / exclusive lock)
//! ```
//!
//! - **ManagerTask**: spawns the loop, latches fatal errors, runs teardown once
//! - **SnapshotStore**: keyed records plus a pending-change set for delta polling
//! - **LatestValue**: single overwrite-only slot
//! - **Subscriptions**: engine subscriptions released exactly once per id

mod error;
mod handler;
mod store;
mod subscriptions;
mod task;

pub use error::ManagerError;
pub use handler::{
    classify_diagnostic, handle_unexpected, DiagnosticClass, ReplyHandler, UpdateStatus,
};
pub use store::{LatestValue, SnapshotStore, Table};
pub use subscriptions::Subscriptions;
pub use task::ManagerTask;
