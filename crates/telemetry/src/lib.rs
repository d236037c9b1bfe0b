//! Tracing subscriber bootstrap.

use anyhow::anyhow;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookstore_kernel::settings::{LogFormat, TelemetrySettings};

/// Build the filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level))
}

/// Install the global subscriber, writing to stderr so stdout stays free for
/// command output. Fails if one is already installed.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(settings));

    let result = match settings.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|err| anyhow!("failed to install tracing subscriber: {}", err))?;

    tracing::info!(
        target: "bookstore-telemetry",
        format = ?settings.log_format,
        level = %settings.log_level,
        "telemetry initialized"
    );
    Ok(())
}
