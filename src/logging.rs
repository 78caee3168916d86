//! Tracing subscriber setup for the binary.
//!
//! Log events go to stderr so command reports on stdout stay clean.
//! `RUST_LOG` overrides the default `info` filter, e.g.
//! `RUST_LOG=repo_help=debug,sqlx=warn`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the global subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "repo_help=debug,repo_help_core=debug,info"
        } else {
            DEFAULT_FILTER
        })
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
}
