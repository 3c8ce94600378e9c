pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod oauth;
pub mod report;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Logs go to stderr so command output on stdout stays clean. `verbose` raises
/// the default level to `debug`; `RUST_LOG` always wins.
///
/// Note: This function can only be called once.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
