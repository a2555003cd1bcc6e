//! Logging setup for bridge hosts.
//!
//! The bridge logs through `tracing`: per-entry diff decisions at `debug`,
//! recovered schema mismatches at `warn`. These helpers install a subscriber
//! that writes to **stderr**, because stdout belongs to the plugin handshake of
//! whatever process hosts the bridge.
//!
//! # Quick Start
//!
//! ```no_run
//! use tf_bridge_sdk::init_logging;
//!
//! init_logging();
//! tracing::info!("bridge starting");
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `tf_bridge_sdk=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show every diff decision the bridge makes
//! RUST_LOG=tf_bridge_sdk::diff=debug ./pulumi-resource-example
//!
//! # Show token deduplication
//! RUST_LOG=tf_bridge_sdk::tokens=debug ./pulumi-tfgen-example
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry().with(filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the default logging subscriber.
///
/// This sets up a `tracing` subscriber that:
/// - Writes to **stderr**
/// - Respects the `RUST_LOG` environment variable for filtering
/// - Defaults to `info` level if `RUST_LOG` is not set
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber("info").init();
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` (e.g. `"debug"`) is used when
/// `RUST_LOG` is not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this never panics, so tests can call it freely.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}
