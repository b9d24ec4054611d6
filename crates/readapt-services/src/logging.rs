//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when neither `RUST_LOG` nor the caller supplies one.
pub const DEFAULT_FILTER: &str = "readapt=info";

/// Install a stdout fmt subscriber.
///
/// `RUST_LOG` takes precedence over `filter`; an unparseable directive falls
/// back to [`DEFAULT_FILTER`]. Returns `false` if a global subscriber was
/// already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
