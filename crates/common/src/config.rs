//! Manager configuration.
//!
//! Every knob has a sensible default and can be overridden from the
//! environment:
//!
//! - `BROKER_SUBSCRIPTION`: `per-id` (default) or `all`
//! - `BROKER_CANCEL_ACK_CODES`: inclusive code range such as `202` or `200-202`

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Diagnostic codes the gateway uses to confirm a cancellation.
pub const DEFAULT_CANCEL_ACK_CODES: RangeInclusive<i64> = 202..=202;

/// How a manager registers interest in replies with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionStrategy {
    /// Subscribe to each id individually; the engine does the filtering.
    #[default]
    PerId,
    /// Subscribe to every reply and filter by id while merging.
    ///
    /// Useful when replies may arrive before their id is known to the manager.
    All,
}

impl SubscriptionStrategy {
    /// Load the strategy from `BROKER_SUBSCRIPTION`.
    ///
    /// Returns `PerId` if not set or invalid.
    pub fn from_env() -> Self {
        std::env::var("BROKER_SUBSCRIPTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for SubscriptionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerId => write!(f, "per-id"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for SubscriptionStrategy {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-id" | "per_id" | "perid" | "id" => Ok(Self::PerId),
            "all" | "subscribe-all" | "any" => Ok(Self::All),
            _ => Err(ParseConfigError::new(
                "subscription strategy",
                s,
                "'per-id' or 'all'",
            )),
        }
    }
}

/// What a manager does with a reply kind it has no merge rule for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnexpectedReplyPolicy {
    /// Stop the control loop and latch an error.
    Fatal,
    /// Log the reply and carry on.
    Ignore,
}

impl fmt::Display for UnexpectedReplyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// Per-manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// How replies are subscribed.
    pub subscription: SubscriptionStrategy,
    /// Handling of replies the manager does not understand.
    pub unexpected_reply: UnexpectedReplyPolicy,
    /// Error-severity diagnostic codes treated as cancellation confirmations.
    pub cancel_ack_codes: RangeInclusive<i64>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            subscription: SubscriptionStrategy::default(),
            unexpected_reply: UnexpectedReplyPolicy::Fatal,
            cancel_ack_codes: DEFAULT_CANCEL_ACK_CODES,
        }
    }
}

impl ManagerConfig {
    /// Defaults for order tracking.
    pub fn for_orders() -> Self {
        Self::default()
    }

    /// Defaults for account tracking.
    pub fn for_account() -> Self {
        Self::default()
    }

    /// Defaults for realtime bar tracking. Unknown replies are tolerated.
    pub fn for_realtime_bars() -> Self {
        Self {
            unexpected_reply: UnexpectedReplyPolicy::Ignore,
            ..Self::default()
        }
    }

    /// Apply environment overrides on top of `self`.
    ///
    /// Invalid values are ignored and the existing setting is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(s) = std::env::var("BROKER_SUBSCRIPTION") {
            if let Ok(strategy) = s.parse() {
                self.subscription = strategy;
            }
        }
        if let Ok(s) = std::env::var("BROKER_CANCEL_ACK_CODES") {
            if let Ok(codes) = parse_code_range(&s) {
                self.cancel_ack_codes = codes;
            }
        }
        self
    }

    /// Returns true if `code` confirms a cancellation.
    pub fn is_cancel_ack(&self, code: i64) -> bool {
        self.cancel_ack_codes.contains(&code)
    }
}

/// Parse `lo-hi` or a single code into an inclusive range.
fn parse_code_range(s: &str) -> Result<RangeInclusive<i64>, ParseConfigError> {
    let err = || ParseConfigError::new("code range", s, "'<code>' or '<lo>-<hi>'");
    let (lo, hi) = match s.trim().split_once('-') {
        Some((lo, hi)) => (lo.trim(), hi.trim()),
        None => (s.trim(), s.trim()),
    };
    let lo: i64 = lo.parse().map_err(|_| err())?;
    let hi: i64 = hi.parse().map_err(|_| err())?;
    if lo > hi {
        return Err(err());
    }
    Ok(lo..=hi)
}

/// Error parsing a configuration value.
#[derive(Debug, Clone)]
pub struct ParseConfigError {
    what: &'static str,
    value: String,
    expected: &'static str,
}

impl ParseConfigError {
    fn new(what: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            what,
            value: value.to_string(),
            expected,
        }
    }
}

impl fmt::Display for ParseConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}', expected {}",
            self.what, self.value, self.expected
        )
    }
}

impl std::error::Error for ParseConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_per_id() {
        assert_eq!(
            "per-id".parse::<SubscriptionStrategy>().unwrap(),
            SubscriptionStrategy::PerId
        );
        assert_eq!(
            "PER_ID".parse::<SubscriptionStrategy>().unwrap(),
            SubscriptionStrategy::PerId
        );
    }

    #[test]
    fn test_parse_all() {
        assert_eq!(
            "all".parse::<SubscriptionStrategy>().unwrap(),
            SubscriptionStrategy::All
        );
        assert_eq!(
            "Subscribe-All".parse::<SubscriptionStrategy>().unwrap(),
            SubscriptionStrategy::All
        );
    }

    #[test]
    fn test_parse_invalid() {
        let err = "sometimes".parse::<SubscriptionStrategy>().unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn test_default_strategy() {
        assert_eq!(SubscriptionStrategy::default(), SubscriptionStrategy::PerId);
    }

    #[test]
    fn test_display_round_trips() {
        for strategy in [SubscriptionStrategy::PerId, SubscriptionStrategy::All] {
            assert_eq!(
                strategy.to_string().parse::<SubscriptionStrategy>().unwrap(),
                strategy
            );
        }
    }

    #[test]
    fn test_manager_defaults() {
        assert_eq!(
            ManagerConfig::for_orders().unexpected_reply,
            UnexpectedReplyPolicy::Fatal
        );
        assert_eq!(
            ManagerConfig::for_account().unexpected_reply,
            UnexpectedReplyPolicy::Fatal
        );
        assert_eq!(
            ManagerConfig::for_realtime_bars().unexpected_reply,
            UnexpectedReplyPolicy::Ignore
        );
    }

    #[test]
    fn test_cancel_ack_codes() {
        let config = ManagerConfig::default();
        assert!(config.is_cancel_ack(202));
        assert!(!config.is_cancel_ack(201));
        assert!(!config.is_cancel_ack(203));
    }

    #[test]
    fn test_parse_code_range() {
        assert_eq!(parse_code_range("202").unwrap(), 202..=202);
        assert_eq!(parse_code_range("200 - 202").unwrap(), 200..=202);
        assert!(parse_code_range("202-200").is_err());
        assert!(parse_code_range("abc").is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("BROKER_SUBSCRIPTION", "all");
        std::env::set_var("BROKER_CANCEL_ACK_CODES", "200-202");

        let config = ManagerConfig::for_orders().with_env_overrides();
        assert_eq!(config.subscription, SubscriptionStrategy::All);
        assert_eq!(config.cancel_ack_codes, 200..=202);
        assert_eq!(SubscriptionStrategy::from_env(), SubscriptionStrategy::All);

        std::env::remove_var("BROKER_SUBSCRIPTION");
        std::env::remove_var("BROKER_CANCEL_ACK_CODES");
    }
}
