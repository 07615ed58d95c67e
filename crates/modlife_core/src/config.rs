use std::env;
use std::time::Duration;

use tracing::warn;

use crate::error::{CoreError, Domain, ErrorKind, Result};

/// Default bound on waiting for a module's transition lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub const LOCK_TIMEOUT_ENV: &str = "MODLIFE_LOCK_TIMEOUT_MS";

/// Settings applied to every module a container creates.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LifecycleConfig {
    pub lock_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl LifecycleConfig {
    /// Defaults, overridden by `MODLIFE_LOCK_TIMEOUT_MS` when it parses.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(LOCK_TIMEOUT_ENV) {
            match parse_millis(&raw) {
                Some(timeout) => config.lock_timeout = timeout,
                None => warn!(value = %raw, "ignoring unparsable {LOCK_TIMEOUT_ENV}"),
            }
        }
        config
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout.is_zero() {
            return Err(CoreError::error()
                .domain(Domain::Config)
                .kind(ErrorKind::InvalidArgument)
                .msg("lock timeout must be greater than zero")
                .build());
        }
        Ok(())
    }
}

/// Parse a millisecond count such as `"250"`.
pub fn parse_millis(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!(LifecycleConfig::default().lock_timeout, Duration::from_secs(5));
        assert!(LifecycleConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = LifecycleConfig::default()
            .with_lock_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(err.domain, Domain::Config);
    }

    #[test]
    fn millis_parsing() {
        assert_eq!(parse_millis(" 250 "), Some(Duration::from_millis(250)));
        assert_eq!(parse_millis("soon"), None);
    }
}
