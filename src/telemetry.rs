//! Telemetry: Opt-in `tracing` subscriber setup.
//!
//! The library only emits events; binaries and demos call [`init`] to see
//! them. `RUST_LOG` overrides the default filter.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Install a stderr fmt subscriber.
///
/// `default_filter` applies when `RUST_LOG` is unset or invalid, e.g.
/// `"streamark=debug"`. Returns `false` if a global subscriber was
/// already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}
