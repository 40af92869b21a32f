use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Production uses flattened
/// JSON events for log aggregation, development a human-readable format.
/// Calling it again (tests, repeated setup) is a no-op.
pub fn init_tracing(production: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        debug!("Tracing already initialized, skipping re-initialization");
    }
}
