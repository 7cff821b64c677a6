//! Logging initialization
//!
//! Events go to stderr so that stdout stays clean for piped output.
//! `RUST_LOG` overrides the level chosen from the command line flags.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber
///
/// Default level is `warn`; `--verbose` raises it to `debug` and `--quiet`
/// lowers it to `error`.
pub fn init(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .try_init();
}

/// Verbose logging for tests
#[cfg(test)]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
