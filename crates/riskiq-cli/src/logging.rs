use tracing_subscriber::EnvFilter;

use crate::error::CliError;

const DEFAULT_FILTER: &str = "warn";

/// Resolve the log filter: `--log-level` wins over `RUST_LOG`, which wins
/// over the default.
pub fn env_filter(level: Option<&str>) -> Result<EnvFilter, CliError> {
    match level {
        Some(value) => EnvFilter::try_new(value).map_err(|error| CliError::LogFilter {
            value: value.to_owned(),
            message: error.to_string(),
        }),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the stderr subscriber. Stdout is reserved for the JSON envelope.
pub fn init_logging(level: Option<&str>) -> Result<(), CliError> {
    let filter = env_filter(level)?;
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
