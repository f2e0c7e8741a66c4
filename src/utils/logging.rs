use crate::utils::toml_config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// Logs always go to stderr: stdout belongs to the MCP transport. `RUST_LOG`
/// wins over `[logging].level`, and `LOG_FORMAT=json` over `[logging].format`.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let layer = if format.eq_ignore_ascii_case("json") {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .boxed()
    };

    // A subscriber may already be set when embedded or under test.
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
