//! Tracing initialization for the binaries

use crate::config::Environment;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise development logs at `debug` and
/// production at `info`. Subsequent calls are no-ops.
pub fn init(environment: Environment) {
    let default = if environment.is_production() {
        "info"
    } else {
        "debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Environment hint read before the full configuration is available
pub fn environment_hint() -> Environment {
    std::env::var("NODE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}
