use env_logger::Env;

/// Install the process logger. `RUST_LOG` wins; otherwise `warn`, or `info` when verbose.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    // A second init (tests, embedding) keeps the first logger.
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}
