//! Tracing subscriber installation.
//!
//! JSON lines on stdout, filtered by `RUST_LOG`. Mapper spans (`flush`) carry
//! the configured mapper name and a per-flush id, so one flush can be
//! followed across its lifecycle events.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize tracing with [`DEFAULT_FILTER`] as the fallback filter.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

/// Initialize tracing, falling back to `default_filter` (e.g.
/// `"objmap_infra=debug"`) when `RUST_LOG` is not set.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_default(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_target(true)
        .try_init()
        .is_ok()
}
