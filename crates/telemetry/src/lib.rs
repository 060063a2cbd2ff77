//! Logging and tracing bootstrap.

use anyhow::anyhow;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookstore_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this twice
/// is an error because the global subscriber can only be set once.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = build_filter(settings);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    result.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        target: "bookstore-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );

    Ok(())
}

fn build_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
