use time::UtcOffset;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::LoggingConfig;
use crate::errors::InitializationError;

/// Initializes the global `tracing` subscriber from a [`LoggingConfig`].
/// Safe to call once per process; a second call returns an error rather
/// than panicking, matching the teacher's `try_init` usage.
pub fn setup_logging(config: &LoggingConfig) -> Result<(), InitializationError> {
    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        time::format_description::well_known::Rfc3339,
    );

    let base_level = config.get_level_filter();
    let mut env_filter = EnvFilter::default().add_directive(base_level.into());

    if config.trace_frames {
        env_filter = env_filter
            .add_directive("modbus_client::framer=trace".parse().unwrap())
            .add_directive("modbus_client::transport=trace".parse().unwrap());
    }

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(config.thread_ids)
        .with_thread_names(config.thread_names)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_level(true)
        .with_timer(timer)
        .with_filter(env_filter);

    Registry::default()
        .with(layer)
        .try_init()
        .map_err(|e| InitializationError::logging(format!("failed to initialize logging: {e}")))
}
