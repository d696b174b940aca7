use std::io;

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `KLOCS_LOG=debug`.
pub const LOG_ENV_VAR: &str = "KLOCS_LOG";

/// Diagnostics go to stderr so the report on stdout stays clean. Without
/// `KLOCS_LOG`, only warnings and errors are shown, or debug events from -vvvv up.
pub fn init_logging(verbosity: u8) {
    let default_level = default_level(verbosity);
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn default_level(verbosity: u8) -> &'static str {
    if verbosity >= 4 {
        "debug"
    } else {
        "warn"
    }
}
