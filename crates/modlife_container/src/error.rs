use modlife_core::error::{CoreError, Domain, ErrorKind, Severity};

pub fn log_core_error(err: &CoreError) {
    match err.severity {
        Severity::Trace => tracing::trace!("{err}"),
        Severity::Debug => tracing::debug!("{err}"),
        Severity::Info => tracing::info!("{err}"),
        Severity::Warn => tracing::warn!("{err}"),
        Severity::Error | Severity::Fatal => tracing::error!("{err}"),
    }
}

pub(crate) fn duplicate_location(location: &str) -> CoreError {
    CoreError::warn()
        .domain(Domain::Container)
        .kind(ErrorKind::InvalidArgument)
        .msgf(format_args!("a module is already installed at {location}"))
        .build()
}
