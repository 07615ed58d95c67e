use std::env;

use modlife_core::config::{parse_millis, LifecycleConfig};
use modlife_core::error::{CoreError, Domain, ErrorKind, Result};

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

pub const EVENT_CAPACITY_ENV: &str = "MODLIFE_EVENT_CAPACITY";
pub const RESOLVE_ON_INSTALL_ENV: &str = "MODLIFE_RESOLVE_ON_INSTALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerConfig {
    pub lifecycle: LifecycleConfig,
    /// Buffered records per broadcast receiver before it lags.
    pub event_capacity: usize,
    /// Attempt a resolve right after each install.
    pub resolve_on_install: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            resolve_on_install: false,
        }
    }
}

impl ContainerConfig {
    pub fn from_env() -> Self {
        Self {
            lifecycle: LifecycleConfig::from_env(),
            event_capacity: env::var(EVENT_CAPACITY_ENV)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
            resolve_on_install: env::var(RESOLVE_ON_INSTALL_ENV)
                .ok()
                .and_then(parse_bool)
                .unwrap_or(false),
        }
    }

    /// Environment defaults overridden by command-line style arguments.
    ///
    /// The first item is taken to be the program name. Unknown arguments are ignored.
    pub fn from_args_iter<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::from_env();

        let mut args = iter.into_iter();
        let _ = args.next();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "--lock-timeout-ms" => {
                    if let Some(timeout) = args.next().and_then(|v| parse_millis(v.as_ref())) {
                        config.lifecycle.lock_timeout = timeout;
                    }
                }
                "--event-capacity" => {
                    if let Some(capacity) = args.next().and_then(|v| v.as_ref().parse().ok()) {
                        config.event_capacity = capacity;
                    }
                }
                "--resolve-on-install" => config.resolve_on_install = true,
                "--no-resolve-on-install" => config.resolve_on_install = false,
                _ if arg.starts_with("--lock-timeout-ms=") => {
                    if let Some(timeout) = parse_millis(&arg["--lock-timeout-ms=".len()..]) {
                        config.lifecycle.lock_timeout = timeout;
                    }
                }
                _ if arg.starts_with("--event-capacity=") => {
                    if let Ok(capacity) = arg["--event-capacity=".len()..].parse() {
                        config.event_capacity = capacity;
                    }
                }
                _ => {}
            }
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        self.lifecycle.validate()?;
        if self.event_capacity == 0 {
            return Err(CoreError::error()
                .domain(Domain::Config)
                .kind(ErrorKind::InvalidArgument)
                .msg("event capacity must be greater than zero")
                .build());
        }
        Ok(())
    }
}

fn parse_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn args_override_defaults() {
        let config = ContainerConfig::from_args_iter([
            "modlife",
            "--lock-timeout-ms",
            "250",
            "--event-capacity=8",
            "--resolve-on-install",
            "--unknown",
        ]);
        assert_eq!(config.lifecycle.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.event_capacity, 8);
        assert!(config.resolve_on_install);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unparsable_values_keep_previous_setting() {
        let config = ContainerConfig::from_args_iter(["modlife", "--lock-timeout-ms=soon"]);
        assert_eq!(
            config.lifecycle.lock_timeout,
            ContainerConfig::from_env().lifecycle.lock_timeout
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = ContainerConfig {
            event_capacity: 0,
            ..ContainerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool(" Yes ".into()), Some(true));
        assert_eq!(parse_bool("off".into()), Some(false));
        assert_eq!(parse_bool("maybe".into()), None);
    }
}
