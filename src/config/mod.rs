use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the balance-chaining and cache layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a cached value is trusted without a store round-trip, in
    /// seconds. A freshness policy, not an operation timeout.
    pub cache_staleness_secs: u64,
    /// How many months the base-snapshot resolution walks backward before
    /// giving up.
    pub walk_back_limit: u32,
    /// Lazy period creation is allowed this many months into the past,
    /// relative to the current calendar month.
    pub past_window_months: u32,
    /// And this many months into the future.
    pub future_window_months: u32,
}

impl EngineConfig {
    pub fn cache_staleness(&self) -> Duration {
        Duration::from_secs(self.cache_staleness_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_staleness_secs: 5 * 60,
            walk_back_limit: 120,
            past_window_months: 24,
            future_window_months: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.walk_back_limit, config.walk_back_limit);
        assert_eq!(back.cache_staleness(), config.cache_staleness());
    }
}
