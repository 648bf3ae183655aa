//! arcvault CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Failures are
//! reported as a JSON error object on stdout, echoed to stderr, and exit
//! with a non-zero status.

use arcvault::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code_str(), e.message());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
