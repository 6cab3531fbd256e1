use crate::error::{MartrelloError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber; `RUST_LOG` overrides the default filter
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_logger(verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "martrello_core=debug,info"
    } else {
        "martrello_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|err| MartrelloError::LoggingInit(err.to_string()))
}
