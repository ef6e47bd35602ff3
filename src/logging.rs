//! Tracing setup for the server binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the tracing filter directive
pub const LOG_ENV: &str = "MERLIN_LOG";

/// Initialize tracing with the MERLIN_LOG environment variable.
///
/// Defaults to "info" level if MERLIN_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
