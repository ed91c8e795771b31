//! Tracing bootstrap shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`. Setting `LOG_FORMAT=json` switches
/// to one JSON object per line.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
