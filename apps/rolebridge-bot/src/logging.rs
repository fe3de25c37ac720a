//! Logging setup using tracing.
//!
//! Text output for interactive runs, flattened JSON for log aggregation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Initialize the tracing subscriber.
///
/// # Arguments
///
/// * `filter` - The log filter directive (e.g., "info,rolebridge=debug")
/// * `format` - Text or JSON output
pub fn init_logging(filter: &str, format: LogFormat) {
    let filter_layer = match EnvFilter::try_new(filter) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("FATAL: Failed to create log filter: {e}");
            std::process::exit(1);
        }
    };

    let registry = tracing_subscriber::registry().with(filter_layer);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true)
                    .flatten_event(true),
            )
            .init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
    }

    tracing::info!(filter = %filter, ?format, "Logging initialized");
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
