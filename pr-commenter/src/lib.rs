pub mod comment;
pub mod commenter;
pub mod config;
pub mod error;
pub mod github;
pub mod repo;
pub mod secret;
pub mod signature;

use std::env;

use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub use crate::commenter::{Commenter, Outcome, Policy};
pub use crate::error::Error;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` selects the filter (default `info`). Setting `RUST_LOG_JSON=1`
/// switches to one JSON object per event. Everything goes to stderr, stdout
/// is reserved for the result line printed by the binary.
pub fn setup_log() {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_json = env::var("RUST_LOG_JSON").is_ok_and(|s| s == "1");

    if log_json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(json_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }

    info!("Logging configured");
}
