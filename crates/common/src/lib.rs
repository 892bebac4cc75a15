//! Shared plumbing for the reply-aggregation workspace: logging bootstrap and
//! environment-driven manager configuration.

mod config;

pub use config::{
    ManagerConfig, ParseConfigError, SubscriptionStrategy, UnexpectedReplyPolicy,
    DEFAULT_CANCEL_ACK_CODES,
};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter is read from `RUST_LOG` and falls back to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed. Use
/// [`try_init_logging`] when that can happen (tests, embedding applications).
pub fn init_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Install the global `tracing` subscriber unless one is already set.
///
/// Returns `true` if this call installed it.
pub fn try_init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
