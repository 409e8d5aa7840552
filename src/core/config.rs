//! Engine configuration

use std::time::Duration;

/// Marketplace used when a sale request does not name one
pub const DEFAULT_MARKETPLACE: &str = "SHOPEE";

/// Default bound on stock lock acquisition
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings shared by the sync and concurrent engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Marketplace whose fees apply to requests without one
    pub marketplace: String,

    /// How long a concurrent settlement waits for its stock locks before
    /// failing with `ConcurrencyConflict`. Unused by the sync engine.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marketplace: DEFAULT_MARKETPLACE.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl EngineConfig {
    pub fn new(marketplace: impl Into<String>, lock_timeout: Duration) -> Self {
        Self {
            marketplace: marketplace.into(),
            lock_timeout,
        }
    }

    /// Resolve the marketplace of a request
    pub fn marketplace_for<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.marketplace)
    }
}
