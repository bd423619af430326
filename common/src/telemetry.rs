use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Installs the process-wide `tracing` subscriber: an `EnvFilter` sourced
/// from `RUST_LOG` (defaulting to `info` when unset) plus a `fmt` layer in
/// either text or JSON form. Call once at process startup; a second call
/// from the same process is a caller error, not something this function
/// guards against.
pub fn init_tracing(format: &LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}
