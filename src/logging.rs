use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, in `EnvFilter` syntax.
pub const LOG_ENV: &str = "TINYSH_LOG";

/// Install the global subscriber. Logs go to stderr so they never mix with
/// command output sent to stdout.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
