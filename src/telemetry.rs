//! Structured logging initialization.
//!
//! Builds a `tracing-subscriber` fmt layer filtered by `RUST_LOG` (falling
//! back to the given default level). Initialization is idempotent so tests
//! and embedding applications can call it freely.

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging at `info` level unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize logging with an explicit fallback level.
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    // try_init fails when a subscriber is already installed; that's fine.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
