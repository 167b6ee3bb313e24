//! CLI module for rpdb
//!
//! Inspection commands over a fixtures directory:
//! - storage-key: derive storage and partition keys
//! - get / list: untyped navigation
//! - active-operations: non-terminal operations of a subscription
//! - list-global: cross-partition listings
//! - change-feed: latest-version change feed

mod args;
mod commands;
mod errors;
mod io;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use args::{Cli, Command, GlobalKind, PageArgs};
pub use commands::{
    active_operations, change_feed, get, list, list_global, run_command, storage_key,
};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};

/// Parse arguments, run the command and write the JSON response.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn run() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse_args();
    match run_command(cli) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code(), &e.to_string())?;
            Err(e)
        }
    }
}

fn init_tracing() {
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}
