//! Logging setup
//!
//! The crate logs through the `log` facade; binaries install `env_logger`
//! through here so `RUST_LOG` always wins over the configured level.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logger with `default_level` unless `RUST_LOG` is set.
///
/// Repeated calls are harmless; only the first installation takes effect.
pub fn init_with_level(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized");
    }
}

/// Initialize the logger at `info`
pub fn init() {
    init_with_level("info");
}
