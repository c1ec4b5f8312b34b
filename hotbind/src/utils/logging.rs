use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with tracing
///
/// This function sets up the tracing subscriber with the following configuration:
/// - Reads filter from RUST_LOG environment variable if available
/// - Falls back to `default_filter` (usually the configured `logging.filter`)
/// - Uses a formatted output layer
///
/// Returns `false` if a global subscriber was already installed.
///
/// # Example
///
/// ```no_run
/// use hotbind_lib::utils::logging::init_logging;
///
/// init_logging("hotbind=debug,warn");
/// ```
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(crate::state::DEFAULT_LOG_FILTER));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("hotbind logging initialized");
    }
    installed
}
