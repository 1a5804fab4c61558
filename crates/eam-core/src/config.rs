//! Version-control configuration

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for the version-control service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcConfig {
    /// Lock lifetime from checkout, in seconds
    pub lock_ttl_secs: u64,

    /// Only initiative participants (or admins) may check out
    pub require_participation: bool,

    /// Replay initiative edits onto a newer baseline when fields do not overlap
    pub auto_rebase: bool,
}

impl Default for VcConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: 24 * 60 * 60,
            require_participation: true,
            auto_rebase: true,
        }
    }
}

impl VcConfig {
    #[inline]
    #[must_use]
    pub fn with_lock_ttl_secs(mut self, secs: u64) -> Self {
        self.lock_ttl_secs = secs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_require_participation(mut self, required: bool) -> Self {
        self.require_participation = required;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_auto_rebase(mut self, enabled: bool) -> Self {
        self.auto_rebase = enabled;
        self
    }

    /// Lock lifetime as a duration
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        let secs = i64::try_from(self.lock_ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        Duration::seconds(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_one_day() {
        assert_eq!(VcConfig::default().lock_ttl(), Duration::hours(24));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: VcConfig = serde_json::from_str(r#"{"lock_ttl_secs": 60}"#).unwrap();
        assert_eq!(config.lock_ttl_secs, 60);
        assert!(config.require_participation);
        assert!(config.auto_rebase);
    }
}
