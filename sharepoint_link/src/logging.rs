//! Logging init for the command-line tool.

use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `RUST_LOG` when set.
///
/// Without `RUST_LOG`, `verbose` picks `debug` for this crate instead of `info`.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "info,sharepoint_link=debug"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
