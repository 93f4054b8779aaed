//! Logging setup
//!
//! The engine logs through the `log` facade; binaries pick the sink.

pub use log::{debug, error, info, trace, warn};

/// Initialize `env_logger` with a default level that `RUST_LOG` can still override.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: log::LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_with_level(log::LevelFilter::Trace);
        init_with_level(log::LevelFilter::Warn);
        debug!("logger installed");
    }
}
