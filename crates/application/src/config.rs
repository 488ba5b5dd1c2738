use std::time::Duration;

use tessera_core::{AppError, AppResult};

/// Freshness window of a loaded session snapshot.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on one permission resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifetime of memoized fine-grained checks.
pub const DEFAULT_CHECK_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Timing configuration for the permission engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionEngineConfig {
    /// Age after which a session snapshot counts as stale.
    pub session_ttl: Duration,
    /// Bound applied to each resolver call made by a session.
    pub resolve_timeout: Duration,
    /// Lifetime of entries in the fine-grained check cache.
    pub check_cache_ttl: Duration,
}

impl PermissionEngineConfig {
    /// Creates a validated configuration.
    pub fn new(
        session_ttl: Duration,
        resolve_timeout: Duration,
        check_cache_ttl: Duration,
    ) -> AppResult<Self> {
        let config = Self {
            session_ttl,
            resolve_timeout,
            check_cache_ttl,
        };
        config.validate()?;
        Ok(config)
    }

    /// Ensures every duration is greater than zero.
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("session_ttl", self.session_ttl),
            ("resolve_timeout", self.resolve_timeout),
            ("check_cache_ttl", self.check_cache_ttl),
        ] {
            if value.is_zero() {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(())
    }
}

impl Default for PermissionEngineConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            check_cache_ttl: DEFAULT_CHECK_CACHE_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::PermissionEngineConfig;

    #[test]
    fn default_config_uses_thirty_minute_window() {
        let config = PermissionEngineConfig::default();
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
        assert_eq!(config.resolve_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = PermissionEngineConfig::new(
            Duration::from_secs(60),
            Duration::ZERO,
            Duration::from_secs(60),
        );
        assert!(config.is_err());
    }
}
