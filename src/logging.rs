// Tracing setup for the binary.
//
// `--log-level` applies to this crate's own events only; the HTTP stack
// (reqwest, hyper) stays at `warn` so debug runs show the upload steps
// without connection-pool chatter. A non-empty `RUST_LOG` replaces the
// whole filter.

use is_terminal::IsTerminal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;
use crate::errors::FirError;

/// Target prefix shared by the library and the binary.
pub const LOG_TARGET: &str = "fir_distribute";

pub fn default_directives(level: &str) -> String {
    format!("warn,{LOG_TARGET}={}", level.trim().to_ascii_lowercase())
}

/// An unparsable `RUST_LOG` is ignored; an unknown `--log-level` is a
/// config error.
fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, FirError> {
    if let Some(filter) = rust_log
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
    {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directives(level))
        .map_err(|e| FirError::Config(format!("invalid log level {level:?}: {e}")))
}

pub fn init_logging(level: &str, format: &LogFormat) -> Result<(), FirError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, rust_log.as_deref())?;

    // stdout only carries the result line
    let stderr = std::io::stderr();
    let layer = fmt::layer()
        .with_ansi(stderr.is_terminal())
        .with_timer(fmt::time::uptime())
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry.with(layer.json().with_current_span(true)).try_init(),
        LogFormat::Text => registry.with(layer.with_target(true)).try_init(),
        LogFormat::Auto => registry.with(layer.compact().with_target(false)).try_init(),
    };
    installed.map_err(|e| FirError::Config(format!("cannot install log subscriber: {e}")))
}
