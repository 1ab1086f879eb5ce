//! Diagnostic logging to stderr.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive for the verbosity flags.
pub const fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "sitesnap_core=debug,sitesnap=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the flags.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
