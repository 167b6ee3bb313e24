//! rpdb CLI entry point
//!
//! Parsing, dispatch and output all live in the CLI module; this only
//! turns a failure into a non-zero exit.

use rpdb::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
