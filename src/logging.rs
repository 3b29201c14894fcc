use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging on stderr so stdout carries only the remote transcript.
///
/// Uses the `RUST_LOG` environment variable if set, otherwise falls back
/// to `default_level` (e.g. "info", "remote_deploy=debug,warn").
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_logging(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if json {
        builder.json().try_init().ok();
    } else {
        builder.compact().try_init().ok();
    }

    tracing::debug!(json, "logging initialised");
}

/// Map `-v` occurrences to a default filter
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
