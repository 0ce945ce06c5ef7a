use log::LevelFilter;

/// Initializes the logger with the `env_logger` crate.
///
/// The filter is taken from `RUST_LOG`. Calling this more than once is harmless;
/// only the first call installs a logger.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Initializes the logger with a fixed default level.
///
/// `RUST_LOG` still overrides the level when it is set.
pub fn init_logger_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
