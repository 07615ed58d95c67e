use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// How bad it is. The container maps this onto a tracing level.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Subsystem that raised the error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Domain {
    Lifecycle,
    Lock,
    Resolver,
    Container,
    Config,
    Other,
}

/// What went wrong; callers match on this.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Transition lock not acquired in time, or the requested kind may not nest.
    StateChange,
    /// Implicit resolve during start failed.
    Resolve,
    /// A start or stop worker failed.
    Activator,
    /// Programming error: uninstalled module used, lock released by a non-holder.
    InvalidState,
    InvalidArgument,
    Other,
}

/// Structured context attached to an error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Payload {
    None,

    /// Named detail, e.g. the cause of a failed resolve.
    Context {
        key: &'static str,
        value: Cow<'static, str>,
    },

    /// Transition-lock context: which module, which transition kind.
    Transition { module_id: u64, event: u8 },
}

/// The one error type that crosses crate boundaries in modlife.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{severity:?}: {message}")]
pub struct CoreError {
    pub domain: Domain,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: Cow<'static, str>,
    pub payload: Payload,
}

impl CoreError {
    #[inline]
    pub fn warn() -> ErrB {
        ErrB::new(Severity::Warn)
    }
    #[inline]
    pub fn error() -> ErrB {
        ErrB::new(Severity::Error)
    }
    #[inline]
    pub fn fatal() -> ErrB {
        ErrB::new(Severity::Fatal)
    }

    /// The transition lock for `event` could not be taken on `module_id`.
    pub fn state_change(module_id: u64, event: u8, reason: &'static str) -> Self {
        CoreError::warn()
            .domain(Domain::Lock)
            .kind(ErrorKind::StateChange)
            .msg(reason)
            .payload(Payload::Transition { module_id, event })
            .build()
    }

    /// The module has been uninstalled and may not be used.
    pub fn uninstalled(module_id: u64) -> Self {
        CoreError::fatal()
            .domain(Domain::Lifecycle)
            .kind(ErrorKind::InvalidState)
            .msgf(format_args!("module {module_id} has been uninstalled"))
            .build()
    }

    /// Wrap a worker failure as an activator error, keeping a core error intact.
    pub fn from_worker(err: anyhow::Error, message: &'static str) -> Self {
        match err.downcast::<CoreError>() {
            Ok(core) => core,
            Err(other) => CoreError::error()
                .domain(Domain::Lifecycle)
                .kind(ErrorKind::Activator)
                .msg(message)
                .payload(Payload::Context {
                    key: "cause",
                    value: format!("{other:#}").into(),
                })
                .build(),
        }
    }
}

/// Builder returned by the severity entry points on [`CoreError`].
///
/// Unset fields stay `Other` / empty / `Payload::None`.
#[derive(Debug, Clone)]
pub struct ErrB {
    domain: Domain,
    kind: ErrorKind,
    severity: Severity,
    message: Cow<'static, str>,
    payload: Payload,
}

impl ErrB {
    #[inline]
    fn new(severity: Severity) -> Self {
        Self {
            domain: Domain::Other,
            kind: ErrorKind::Other,
            severity,
            message: Cow::Borrowed(""),
            payload: Payload::None,
        }
    }

    #[inline]
    pub fn domain(mut self, d: Domain) -> Self {
        self.domain = d;
        self
    }

    #[inline]
    pub fn kind(mut self, k: ErrorKind) -> Self {
        self.kind = k;
        self
    }

    #[inline]
    pub fn msg(mut self, m: impl Into<Cow<'static, str>>) -> Self {
        self.message = m.into();
        self
    }

    /// Message from format arguments, e.g. `msgf(format_args!("module {id}"))`.
    #[inline]
    pub fn msgf(mut self, args: fmt::Arguments<'_>) -> Self {
        self.message = Cow::Owned(args.to_string());
        self
    }

    /// Replaces any payload set earlier.
    #[inline]
    pub fn payload(mut self, p: Payload) -> Self {
        self.payload = p;
        self
    }

    #[inline]
    pub fn build(self) -> CoreError {
        CoreError {
            domain: self.domain,
            kind: self.kind,
            severity: self.severity,
            message: self.message,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_error_is_wrapped_as_activator() {
        let err = CoreError::from_worker(anyhow::anyhow!("boom"), "error starting module");
        assert_eq!(err.kind, ErrorKind::Activator);
        assert_eq!(err.message, "error starting module");
        match err.payload {
            Payload::Context { key, value } => {
                assert_eq!(key, "cause");
                assert!(value.contains("boom"));
            }
            _ => panic!("expected cause payload"),
        }
    }

    #[test]
    fn core_error_from_worker_passes_through() {
        let inner = CoreError::warn()
            .domain(Domain::Resolver)
            .kind(ErrorKind::Resolve)
            .msg("nested")
            .build();
        let err = CoreError::from_worker(inner.clone().into(), "error starting module");
        assert_eq!(err, inner);
    }

    #[test]
    fn display_includes_severity_and_message() {
        let err = CoreError::uninstalled(7);
        assert_eq!(err.to_string(), "Fatal: module 7 has been uninstalled");
    }
}
