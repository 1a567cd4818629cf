//! Shared test utilities: tracing setup.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code with tracing::info!, tracing::debug!, etc.
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: filter directives (e.g. `dirtree=debug`)
//! - `DIRTREE_LOG_DIR`: when set, JSON logs are written to
//!   `<dir>/dirtree.json`
//! - `DIRTREE_LOG_CONSOLE`: set to "0" to disable console output

#![allow(dead_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

/// Create an `EnvFilter` from `RUST_LOG` or fall back to `default_level`.
fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

fn setup_tracing() {
    let console_enabled = env::var("DIRTREE_LOG_CONSOLE").map_or(true, |v| v != "0");

    // === Console layer ===
    let console_layer = if console_enabled {
        Some(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .compact()
                .with_filter(make_filter(Level::INFO)),
        )
    } else {
        None
    };

    // === File layer (JSON lines) ===
    let file_layer = env::var("DIRTREE_LOG_DIR").ok().map(|dir| {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir).expect("failed to create log directory");
        let file =
            std::fs::File::create(dir.join("dirtree.json")).expect("failed to create log file");

        tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_thread_ids(true)
            .with_target(true)
            .with_ansi(false)
            .json()
            .with_filter(make_filter(Level::DEBUG))
    });

    // try_init: harmless if a subscriber is already installed.
    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
