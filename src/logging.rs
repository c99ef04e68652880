//! Diagnostic logging setup. Logs go to stderr so `--json` output on stdout stays clean.

use tracing_subscriber::EnvFilter;

/// Level used when neither RUST_LOG nor a configured level is present.
pub const DEFAULT_LEVEL: &str = "warn";

/// Filter precedence: RUST_LOG, then `level`, then [DEFAULT_LEVEL]. An unparsable
/// `level` falls back to the default.
pub fn filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        level
            .and_then(|l| EnvFilter::try_new(l).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
    })
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
