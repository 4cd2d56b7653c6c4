//! Structured logging setup (§10.1): a compact, time-stamped formatter, with
//! `debug` widening the default verbosity and `RUST_LOG` able to narrow or
//! widen it further.

use time::macros::format_description;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Must be called once, before any
/// other logging happens; both binaries do this as their first action.
pub fn initialize(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let timer = UtcTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(debug)
        .init();
}
